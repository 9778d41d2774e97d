pub mod notify;
pub mod repository;

pub use notify::{Notifier, NotifyError};
pub use repository::{Cancellation, Directory, ExpirySweep, OfferCandidate, RequestCandidate};

use ridepool_shared::MatchStatus;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid match transition from {from:?} to {to:?}")]
    InvalidTransition { from: MatchStatus, to: MatchStatus },

    #[error("Allocation exceeds remaining capacity: {0}")]
    CapacityExceeded(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
