use ridepool_shared::{Allocation, NeedSet, RideRequest, SeatPool};

/// How a single request may be seated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationPolicy {
    /// All passengers in one atomic grant, or nothing
    pub must_travel_together: bool,
    /// Let a couple take two seats of the same segregated category.
    /// No caller enables this; it stays off unless a deployment opts in.
    pub allow_same_gender_couple: bool,
}

impl AllocationPolicy {
    pub fn together() -> Self {
        Self {
            must_travel_together: true,
            allow_same_gender_couple: false,
        }
    }

    pub fn partial() -> Self {
        Self::default()
    }

    pub fn for_request(request: &RideRequest) -> Self {
        Self {
            must_travel_together: request.must_travel_together,
            allow_same_gender_couple: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationOutcome {
    /// The whole need was seated
    Satisfied,
    /// Some passengers were seated, some remain
    Partial,
    /// Nothing was seated
    Unsatisfied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationResult {
    pub outcome: AllocationOutcome,
    /// Seats left after the grant
    pub pool: SeatPool,
    pub allocation: Allocation,
    /// Need left after the grant
    pub remaining: NeedSet,
}

impl AllocationResult {
    pub fn is_satisfied(&self) -> bool {
        self.outcome == AllocationOutcome::Satisfied
    }

    fn unsatisfied(pool: SeatPool, need: NeedSet) -> Self {
        Self {
            outcome: AllocationOutcome::Unsatisfied,
            pool,
            allocation: Allocation::default(),
            remaining: need,
        }
    }
}

/// Seat `need` from `pool` under `policy`.
///
/// Pure: both inputs are copied, so the caller's pool is unchanged whatever
/// the outcome and identical inputs always give identical results. A together
/// policy either seats everyone or returns the input pool untouched.
pub fn allocate(pool: &SeatPool, need: &NeedSet, policy: AllocationPolicy) -> AllocationResult {
    let mut seating = Seating::new(*pool, policy.allow_same_gender_couple);

    if policy.must_travel_together {
        let seated_all = (0..need.couples).all(|_| seating.seat_couple())
            && (0..need.males).all(|_| seating.seat_male())
            && (0..need.females).all(|_| seating.seat_female())
            && (0..need.children).all(|_| seating.seat_child());

        if !seated_all {
            return AllocationResult::unsatisfied(*pool, *need);
        }

        return AllocationResult {
            outcome: AllocationOutcome::Satisfied,
            pool: seating.pool,
            allocation: seating.allocation,
            remaining: NeedSet::default(),
        };
    }

    let mut remaining = *need;
    while remaining.couples > 0 && seating.seat_couple() {
        remaining.couples -= 1;
    }
    while remaining.males > 0 && seating.seat_male() {
        remaining.males -= 1;
    }
    while remaining.females > 0 && seating.seat_female() {
        remaining.females -= 1;
    }
    while remaining.children > 0 && seating.seat_child() {
        remaining.children -= 1;
    }

    let outcome = if remaining.is_empty() {
        AllocationOutcome::Satisfied
    } else if seating.allocation.is_empty() {
        AllocationOutcome::Unsatisfied
    } else {
        AllocationOutcome::Partial
    };

    AllocationResult {
        outcome,
        pool: seating.pool,
        allocation: seating.allocation,
        remaining,
    }
}

/// Working copy of a pool plus the counters of what has been seated so far
struct Seating {
    pool: SeatPool,
    allocation: Allocation,
    allow_same_gender_couple: bool,
}

impl Seating {
    fn new(pool: SeatPool, allow_same_gender_couple: bool) -> Self {
        Self {
            pool,
            allocation: Allocation::default(),
            allow_same_gender_couple,
        }
    }

    /// Male-only plus female-only, else two any-gender, else (fallback only)
    /// two seats of one segregated category
    fn seat_couple(&mut self) -> bool {
        let pool = &mut self.pool;
        let alloc = &mut self.allocation;

        if pool.male_only > 0 && pool.female_only > 0 {
            pool.male_only -= 1;
            pool.female_only -= 1;
            alloc.male += 1;
            alloc.female += 1;
        } else if pool.any_gender >= 2 {
            pool.any_gender -= 2;
            alloc.any_gender += 2;
        } else if self.allow_same_gender_couple && pool.male_only >= 2 {
            pool.male_only -= 2;
            alloc.male += 2;
        } else if self.allow_same_gender_couple && pool.female_only >= 2 {
            pool.female_only -= 2;
            alloc.female += 2;
        } else {
            return false;
        }

        alloc.couples += 1;
        true
    }

    fn seat_male(&mut self) -> bool {
        if self.pool.male_only > 0 {
            self.pool.male_only -= 1;
            self.allocation.male += 1;
        } else if self.pool.any_gender > 0 {
            self.pool.any_gender -= 1;
            self.allocation.any_gender += 1;
        } else {
            return false;
        }

        self.allocation.single_males += 1;
        true
    }

    fn seat_female(&mut self) -> bool {
        if self.pool.female_only > 0 {
            self.pool.female_only -= 1;
            self.allocation.female += 1;
        } else if self.pool.any_gender > 0 {
            self.pool.any_gender -= 1;
            self.allocation.any_gender += 1;
        } else {
            return false;
        }

        self.allocation.single_females += 1;
        true
    }

    /// Children take any-gender seats first and only then segregated ones
    fn seat_child(&mut self) -> bool {
        if self.pool.any_gender > 0 {
            self.pool.any_gender -= 1;
            self.allocation.any_gender += 1;
        } else if self.pool.male_only > 0 {
            self.pool.male_only -= 1;
            self.allocation.male += 1;
        } else if self.pool.female_only > 0 {
            self.pool.female_only -= 1;
            self.allocation.female += 1;
        } else {
            return false;
        }

        self.allocation.children += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_couple_takes_one_seat_of_each_gender() {
        let pool = SeatPool::new(1, 1, 0);
        let need = NeedSet::new(1, 0, 0, 0);

        let result = allocate(&pool, &need, AllocationPolicy::together());

        assert!(result.is_satisfied());
        assert_eq!(result.allocation.couples, 1);
        assert_eq!(result.allocation.male, 1);
        assert_eq!(result.allocation.female, 1);
        assert_eq!(result.allocation.any_gender, 0);
        assert_eq!(result.pool, SeatPool::new(0, 0, 0));
    }

    #[test]
    fn test_partial_policy_seats_males_then_child_on_any_gender() {
        let pool = SeatPool::new(0, 0, 3);
        let need = NeedSet::new(0, 2, 0, 1);

        let result = allocate(&pool, &need, AllocationPolicy::partial());

        assert_eq!(result.outcome, AllocationOutcome::Satisfied);
        assert_eq!(result.allocation.any_gender, 3);
        assert_eq!(result.allocation.single_males, 2);
        assert_eq!(result.allocation.children, 1);
        assert_eq!(result.pool, SeatPool::new(0, 0, 0));
        assert!(result.remaining.is_empty());
    }

    #[test]
    fn test_together_failure_leaves_pool_untouched() {
        let pool = SeatPool::new(1, 0, 1);
        let need = NeedSet::new(0, 1, 2, 0);

        let result = allocate(&pool, &need, AllocationPolicy::together());

        assert_eq!(result.outcome, AllocationOutcome::Unsatisfied);
        assert_eq!(result.pool, pool);
        assert_eq!(result.allocation, Allocation::default());
        assert_eq!(result.remaining, need);
    }

    #[test]
    fn test_partial_policy_returns_remainder() {
        let pool = SeatPool::new(1, 0, 1);
        let need = NeedSet::new(0, 1, 2, 0);

        let result = allocate(&pool, &need, AllocationPolicy::partial());

        assert_eq!(result.outcome, AllocationOutcome::Partial);
        assert_eq!(result.allocation.male, 1);
        assert_eq!(result.allocation.any_gender, 1);
        assert_eq!(result.allocation.single_females, 1);
        assert_eq!(result.remaining, NeedSet::new(0, 0, 1, 0));
        assert!(result.pool.is_empty());
    }

    #[test]
    fn test_couple_needs_two_any_gender_without_mixed_pair() {
        let need = NeedSet::new(1, 0, 0, 0);

        let result = allocate(&SeatPool::new(2, 0, 1), &need, AllocationPolicy::partial());
        assert_eq!(result.outcome, AllocationOutcome::Unsatisfied);

        let result = allocate(&SeatPool::new(2, 0, 2), &need, AllocationPolicy::partial());
        assert!(result.is_satisfied());
        assert_eq!(result.allocation.any_gender, 2);
        assert_eq!(result.pool, SeatPool::new(2, 0, 0));
    }

    #[test]
    fn test_same_gender_couple_fallback_only_when_enabled() {
        let pool = SeatPool::new(2, 0, 0);
        let need = NeedSet::new(1, 0, 0, 0);

        assert_eq!(
            allocate(&pool, &need, AllocationPolicy::together()).outcome,
            AllocationOutcome::Unsatisfied
        );

        let policy = AllocationPolicy {
            must_travel_together: true,
            allow_same_gender_couple: true,
        };
        let result = allocate(&pool, &need, policy);
        assert!(result.is_satisfied());
        assert_eq!(result.allocation.male, 2);
        assert_eq!(result.allocation.couples, 1);
    }

    #[test]
    fn test_two_men_declared_as_couple_never_take_female_seat() {
        let need = NeedSet::from_passengers(2, 0, 0, 1);

        let result = allocate(&SeatPool::new(1, 1, 0), &need, AllocationPolicy::together());
        assert_eq!(result.outcome, AllocationOutcome::Unsatisfied);
        assert_eq!(result.pool, SeatPool::new(1, 1, 0));

        let result = allocate(&SeatPool::new(1, 1, 0), &need, AllocationPolicy::partial());
        assert_eq!(result.allocation.female, 0);
        assert_eq!(result.allocation.male, 1);
        assert_eq!(result.remaining, NeedSet::new(0, 1, 0, 0));

        let result = allocate(&SeatPool::new(2, 0, 0), &need, AllocationPolicy::together());
        assert!(result.is_satisfied());
        assert_eq!(result.allocation.male, 2);
        assert_eq!(result.allocation.couples, 0);
    }

    #[test]
    fn test_child_prefers_any_gender_then_male_then_female() {
        let need = NeedSet::new(0, 0, 0, 1);

        let result = allocate(&SeatPool::new(1, 1, 1), &need, AllocationPolicy::partial());
        assert_eq!(result.pool, SeatPool::new(1, 1, 0));

        let result = allocate(&SeatPool::new(1, 1, 0), &need, AllocationPolicy::partial());
        assert_eq!(result.pool, SeatPool::new(0, 1, 0));

        let result = allocate(&SeatPool::new(0, 1, 0), &need, AllocationPolicy::partial());
        assert_eq!(result.pool, SeatPool::new(0, 0, 0));
        assert_eq!(result.allocation.female, 1);
    }

    #[test]
    fn test_adults_prefer_segregated_seats() {
        let pool = SeatPool::new(1, 1, 2);
        let need = NeedSet::new(0, 2, 1, 0);

        let result = allocate(&pool, &need, AllocationPolicy::together());

        assert_eq!(result.allocation.male, 1);
        assert_eq!(result.allocation.female, 1);
        assert_eq!(result.allocation.any_gender, 1);
        assert_eq!(result.pool, SeatPool::new(0, 0, 1));
    }

    #[test]
    fn test_allocation_is_deterministic() {
        let pool = SeatPool::new(1, 2, 2);
        let need = NeedSet::new(1, 1, 2, 1);

        for policy in [AllocationPolicy::together(), AllocationPolicy::partial()] {
            let first = allocate(&pool, &need, policy);
            for _ in 0..5 {
                assert_eq!(allocate(&pool, &need, policy), first);
            }
        }
    }

    #[test]
    fn test_seats_are_conserved() {
        // Small exhaustive sweep: consumed seats always equal the category counters
        for male_only in 0..3 {
            for female_only in 0..3 {
                for any_gender in 0..4 {
                    let pool = SeatPool::new(male_only, female_only, any_gender);
                    for need in [
                        NeedSet::new(1, 1, 0, 1),
                        NeedSet::new(2, 0, 1, 0),
                        NeedSet::new(0, 2, 2, 2),
                    ] {
                        for policy in [AllocationPolicy::together(), AllocationPolicy::partial()] {
                            let result = allocate(&pool, &need, policy);
                            let consumed = pool.total() - result.pool.total();

                            assert_eq!(result.allocation.seats(), consumed);
                            assert_eq!(pool.checked_take(&result.allocation), Some(result.pool));
                            assert_eq!(result.allocation.seated().passengers(), consumed);
                            assert_eq!(
                                result.remaining.passengers() + consumed,
                                need.passengers()
                            );
                        }
                    }
                }
            }
        }
    }
}
