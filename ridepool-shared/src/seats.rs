use serde::{Deserialize, Serialize};

use crate::models::Allocation;

/// Seat inventory of a ride, split by gender segregation category.
///
/// `SeatPool` is `Copy`: every allocation attempt works on its own copy, so a
/// caller's pool is never touched by a failed attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatPool {
    pub male_only: u32,
    pub female_only: u32,
    pub any_gender: u32,
}

impl SeatPool {
    pub fn new(male_only: u32, female_only: u32, any_gender: u32) -> Self {
        Self {
            male_only,
            female_only,
            any_gender,
        }
    }

    pub fn total(&self) -> u32 {
        self.male_only
            .saturating_add(self.female_only)
            .saturating_add(self.any_gender)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Pool left after the seats of `allocation` are taken, or `None` if any
    /// category would go negative.
    pub fn checked_take(&self, allocation: &Allocation) -> Option<SeatPool> {
        Some(SeatPool {
            male_only: self.male_only.checked_sub(allocation.male)?,
            female_only: self.female_only.checked_sub(allocation.female)?,
            any_gender: self.any_gender.checked_sub(allocation.any_gender)?,
        })
    }

    pub fn saturating_take(&self, allocation: &Allocation) -> SeatPool {
        SeatPool {
            male_only: self.male_only.saturating_sub(allocation.male),
            female_only: self.female_only.saturating_sub(allocation.female),
            any_gender: self.any_gender.saturating_sub(allocation.any_gender),
        }
    }
}

/// Passenger need of a request, by passenger kind.
///
/// `males` and `females` count single adults only; each couple is two
/// further adults seated as a unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NeedSet {
    pub couples: u32,
    pub males: u32,
    pub females: u32,
    pub children: u32,
}

impl NeedSet {
    pub fn new(couples: u32, males: u32, females: u32, children: u32) -> Self {
        Self {
            couples,
            males,
            females,
            children,
        }
    }

    /// Split raw passenger counts into couples and single adults.
    ///
    /// `males` and `females` include the couples. Only a man and a woman form
    /// a seated couple; a pair of the same gender stays as two single adults
    /// of that gender, so neither can land on the other gender's seat.
    pub fn from_passengers(males: u32, females: u32, children: u32, couples: u32) -> Self {
        let mixed = couples.min(males).min(females);

        Self {
            couples: mixed,
            males: males - mixed,
            females: females - mixed,
            children,
        }
    }

    /// Number of people, couples counting twice
    pub fn passengers(&self) -> u32 {
        self.couples * 2 + self.males + self.females + self.children
    }

    pub fn is_empty(&self) -> bool {
        self.passengers() == 0
    }

    pub fn saturating_sub(&self, other: &NeedSet) -> NeedSet {
        NeedSet {
            couples: self.couples.saturating_sub(other.couples),
            males: self.males.saturating_sub(other.males),
            females: self.females.saturating_sub(other.females),
            children: self.children.saturating_sub(other.children),
        }
    }

    /// True when every category of `self` fits within `other`
    pub fn fits_within(&self, other: &NeedSet) -> bool {
        self.couples <= other.couples
            && self.males <= other.males
            && self.females <= other.females
            && self.children <= other.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_couples_pair_across_genders() {
        let need = NeedSet::from_passengers(2, 1, 0, 1);
        assert_eq!(need, NeedSet::new(1, 1, 0, 0));
        assert_eq!(need.passengers(), 3);
    }

    #[test]
    fn test_same_gender_pair_stays_single_adults() {
        let need = NeedSet::from_passengers(2, 0, 0, 1);
        assert_eq!(need, NeedSet::new(0, 2, 0, 0));

        let need = NeedSet::from_passengers(3, 0, 1, 1);
        assert_eq!(need, NeedSet::new(0, 3, 0, 1));

        // One mixed couple, the second declared couple is two women
        let need = NeedSet::from_passengers(1, 3, 0, 2);
        assert_eq!(need, NeedSet::new(1, 0, 2, 0));
        assert_eq!(need.passengers(), 4);
    }

    #[test]
    fn test_take_allocation_from_pool() {
        let pool = SeatPool::new(1, 1, 2);
        let allocation = Allocation {
            male: 1,
            any_gender: 2,
            ..Allocation::default()
        };

        assert_eq!(pool.checked_take(&allocation), Some(SeatPool::new(0, 1, 0)));

        let too_much = Allocation {
            female: 2,
            ..Allocation::default()
        };
        assert_eq!(pool.checked_take(&too_much), None);
        assert_eq!(pool.saturating_take(&too_much), SeatPool::new(1, 0, 2));
    }
}
