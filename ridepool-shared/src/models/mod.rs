pub mod events;
pub mod matching;
pub mod ride;
pub mod user;

pub use events::{RingbackEvent, RingbackRole};
pub use matching::{Allocation, Match, MatchStatus};
pub use ride::{Direction, Offer, OfferStatus, Passengers, RequestStatus, RideRequest};
pub use user::{Gender, User};
