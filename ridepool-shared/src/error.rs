/// Precondition violations caught when a record is constructed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Offer must have between 1 and {max} seats, got {got}")]
    SeatCount { got: u32, max: u32 },

    #[error("Request must have between 1 and {max} passengers, got {got}")]
    PassengerCount { got: u32, max: u32 },

    #[error("{couples} couples need at least {needed} adults, request has {adults}")]
    CouplesExceedAdults { couples: u32, needed: u32, adults: u32 },

    #[error("Time window is inverted: earliest is after latest")]
    InvertedWindow,

    #[error("Preferred time lies outside the requested window")]
    PreferredOutsideWindow,

    #[error("Time is in the past: {0}")]
    InThePast(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),
}
