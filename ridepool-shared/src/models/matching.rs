use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use uuid::Uuid;

use crate::seats::NeedSet;

/// Match status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Pending,
    Notified,
    Connected,
    Accepted,
    Declined,
    Cancelled,
    Expired,
}

impl MatchStatus {
    /// Statuses whose allocation still counts against capacity and need
    pub const ACTIVE: [MatchStatus; 4] = [
        MatchStatus::Pending,
        MatchStatus::Notified,
        MatchStatus::Connected,
        MatchStatus::Accepted,
    ];

    /// Statuses the periodic sweep may expire
    pub const EXPIRABLE: [MatchStatus; 2] = [MatchStatus::Pending, MatchStatus::Notified];

    pub fn holds_capacity(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MatchStatus::Declined | MatchStatus::Cancelled | MatchStatus::Expired
        )
    }

    /// Whether the lifecycle permits moving from `self` to `next`.
    ///
    /// Accepted is final for the parties but still yields to a cancellation
    /// of the owning offer or request.
    pub fn can_transition_to(&self, next: MatchStatus) -> bool {
        use MatchStatus::*;

        match (self, next) {
            (Pending, Notified | Accepted | Declined | Cancelled | Expired) => true,
            (Notified, Connected | Accepted | Declined | Cancelled | Expired) => true,
            (Connected, Accepted | Declined | Cancelled) => true,
            (Accepted, Cancelled) => true,
            _ => false,
        }
    }
}

/// Seats granted by one allocation.
///
/// `male`, `female` and `any_gender` count seats taken from each category and
/// sum to the seats consumed. `couples` and `children` say how many of those
/// seats went to couples and children; `single_males` and `single_females`
/// cover the remaining adults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allocation {
    #[serde(rename = "allocated_couples")]
    pub couples: u32,
    #[serde(rename = "allocated_male")]
    pub male: u32,
    #[serde(rename = "allocated_female")]
    pub female: u32,
    #[serde(rename = "allocated_any_gender")]
    pub any_gender: u32,
    #[serde(rename = "allocated_children")]
    pub children: u32,
    pub single_males: u32,
    pub single_females: u32,
}

impl Allocation {
    pub fn seats(&self) -> u32 {
        self.male + self.female + self.any_gender
    }

    pub fn is_empty(&self) -> bool {
        self.seats() == 0
    }

    /// Passengers seated, by kind
    pub fn seated(&self) -> NeedSet {
        NeedSet {
            couples: self.couples,
            males: self.single_males,
            females: self.single_females,
            children: self.children,
        }
    }
}

impl AddAssign<&Allocation> for Allocation {
    fn add_assign(&mut self, other: &Allocation) {
        self.couples += other.couples;
        self.male += other.male;
        self.female += other.female;
        self.any_gender += other.any_gender;
        self.children += other.children;
        self.single_males += other.single_males;
        self.single_females += other.single_females;
    }
}

/// One allocation outcome linking an offer and a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: Uuid,
    pub offer_id: Uuid,
    pub request_id: Uuid,
    #[serde(flatten)]
    pub allocation: Allocation,
    pub status: MatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn new(offer_id: Uuid, request_id: Uuid, allocation: Allocation, status: MatchStatus) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            offer_id,
            request_id,
            allocation,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_status(&mut self, status: MatchStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        use MatchStatus::*;

        assert!(Pending.can_transition_to(Notified));
        assert!(Notified.can_transition_to(Connected));
        assert!(Connected.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(Cancelled));

        assert!(!Accepted.can_transition_to(Expired));
        assert!(!Connected.can_transition_to(Expired));
        assert!(!Expired.can_transition_to(Pending));
        assert!(!Declined.can_transition_to(Accepted));
        assert!(!Pending.can_transition_to(Pending));
    }

    #[test]
    fn test_accepted_still_holds_capacity() {
        assert!(MatchStatus::Accepted.holds_capacity());
        assert!(!MatchStatus::Accepted.is_terminal());
        assert!(!MatchStatus::Expired.holds_capacity());
    }

    #[test]
    fn test_allocation_sums() {
        let mut total = Allocation::default();
        total += &Allocation {
            couples: 1,
            male: 1,
            female: 1,
            ..Allocation::default()
        };
        total += &Allocation {
            any_gender: 2,
            children: 1,
            single_males: 1,
            ..Allocation::default()
        };

        assert_eq!(total.seats(), 4);
        assert_eq!(total.seated(), NeedSet::new(1, 1, 0, 1));
        assert_eq!(total.seated().passengers(), total.seats());
    }

    #[test]
    fn test_match_wire_fields() {
        let m = Match::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Allocation {
                couples: 1,
                male: 1,
                female: 1,
                ..Allocation::default()
            },
            MatchStatus::Pending,
        );

        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["allocated_couples"], 1);
        assert_eq!(json["allocated_any_gender"], 0);
        assert_eq!(json["status"], "PENDING");
    }
}
