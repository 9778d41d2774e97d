use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;
use crate::seats::{NeedSet, SeatPool};
use crate::MAX_PARTY_SIZE;

/// Travel direction relative to the community the service runs for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    From,
    To,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    Active,
    Partial,
    Matched,
    Cancelled,
}

impl OfferStatus {
    /// Status implied by `allocated` seats out of `total`
    pub fn from_allocation(total: u32, allocated: u32) -> Self {
        if allocated >= total {
            OfferStatus::Matched
        } else if allocated > 0 {
            OfferStatus::Partial
        } else {
            OfferStatus::Active
        }
    }

    pub fn accepts_matches(&self) -> bool {
        matches!(self, OfferStatus::Active | OfferStatus::Partial)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Open,
    Partial,
    Matched,
    Cancelled,
}

impl RequestStatus {
    /// Status implied by `seated` passengers out of `total`
    pub fn from_allocation(total: u32, seated: u32) -> Self {
        if seated >= total {
            RequestStatus::Matched
        } else if seated > 0 {
            RequestStatus::Partial
        } else {
            RequestStatus::Open
        }
    }

    pub fn accepts_matches(&self) -> bool {
        matches!(self, RequestStatus::Open | RequestStatus::Partial)
    }
}

/// A driver's posted ride
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub direction: Direction,
    pub departure_time: DateTime<Utc>,
    pub seats: SeatPool,
    pub status: OfferStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offer {
    pub fn new(
        driver_id: Uuid,
        direction: Direction,
        departure_time: DateTime<Utc>,
        seats: SeatPool,
    ) -> Result<Self, ModelError> {
        let total = seats.total();
        if total == 0 || total > MAX_PARTY_SIZE {
            return Err(ModelError::SeatCount {
                got: total,
                max: MAX_PARTY_SIZE,
            });
        }

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            driver_id,
            direction,
            departure_time,
            seats,
            status: OfferStatus::Active,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn capacity(&self) -> SeatPool {
        self.seats
    }

    pub fn update_status(&mut self, status: OfferStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Passenger counts as declared by a rider. `male` and `female` include the
/// members of `couples`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passengers {
    pub male: u32,
    pub female: u32,
    pub children: u32,
    pub couples: u32,
}

impl Passengers {
    pub fn total(&self) -> u32 {
        self.male.saturating_add(self.female).saturating_add(self.children)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        for count in [self.male, self.female, self.children, self.total()] {
            if count > MAX_PARTY_SIZE {
                return Err(ModelError::PassengerCount {
                    got: count,
                    max: MAX_PARTY_SIZE,
                });
            }
        }
        if self.total() == 0 {
            return Err(ModelError::PassengerCount {
                got: 0,
                max: MAX_PARTY_SIZE,
            });
        }

        let adults = self.male + self.female;
        let needed = self.couples.saturating_mul(2);
        if needed > adults {
            return Err(ModelError::CouplesExceedAdults {
                couples: self.couples,
                needed,
                adults,
            });
        }
        Ok(())
    }
}

/// A rider's posted need
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: Uuid,
    pub rider_id: Uuid,
    pub direction: Direction,
    pub earliest_time: DateTime<Utc>,
    pub latest_time: DateTime<Utc>,
    pub preferred_time: Option<DateTime<Utc>>,
    pub passengers_male: u32,
    pub passengers_female: u32,
    pub children_count: u32,
    pub couples_count: u32,
    pub must_travel_together: bool,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RideRequest {
    pub fn new(
        rider_id: Uuid,
        direction: Direction,
        earliest_time: DateTime<Utc>,
        latest_time: DateTime<Utc>,
        passengers: Passengers,
        must_travel_together: bool,
    ) -> Result<Self, ModelError> {
        if earliest_time > latest_time {
            return Err(ModelError::InvertedWindow);
        }
        passengers.validate()?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            rider_id,
            direction,
            earliest_time,
            latest_time,
            preferred_time: None,
            passengers_male: passengers.male,
            passengers_female: passengers.female,
            children_count: passengers.children,
            couples_count: passengers.couples,
            must_travel_together,
            status: RequestStatus::Open,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn with_preferred_time(mut self, preferred: DateTime<Utc>) -> Result<Self, ModelError> {
        if !self.window_contains(preferred) {
            return Err(ModelError::PreferredOutsideWindow);
        }
        self.preferred_time = Some(preferred);
        Ok(self)
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn passengers(&self) -> Passengers {
        Passengers {
            male: self.passengers_male,
            female: self.passengers_female,
            children: self.children_count,
            couples: self.couples_count,
        }
    }

    pub fn total_passengers(&self) -> u32 {
        self.passengers().total()
    }

    /// Full need of this request, before any match
    pub fn need(&self) -> NeedSet {
        NeedSet::from_passengers(
            self.passengers_male,
            self.passengers_female,
            self.children_count,
            self.couples_count,
        )
    }

    pub fn window_contains(&self, time: DateTime<Utc>) -> bool {
        self.earliest_time <= time && time <= self.latest_time
    }

    /// Absolute distance between `time` and the preferred time, if one is set
    pub fn distance_from_preferred(&self, time: DateTime<Utc>) -> Option<Duration> {
        self.preferred_time.map(|preferred| {
            let delta = time - preferred;
            if delta < Duration::zero() {
                -delta
            } else {
                delta
            }
        })
    }

    pub fn update_status(&mut self, status: RequestStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
