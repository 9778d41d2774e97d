pub mod error;
pub mod models;
pub mod pii;
pub mod seats;

pub use error::ModelError;
pub use models::{
    Allocation, Direction, Gender, Match, MatchStatus, Offer, OfferStatus, Passengers,
    RequestStatus, RideRequest, RingbackEvent, RingbackRole, User,
};
pub use seats::{NeedSet, SeatPool};

/// Upper bound on seats per offer and passengers per request
pub const MAX_PARTY_SIZE: u32 = 9;
