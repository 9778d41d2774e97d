pub mod error;
pub mod service;
pub mod worker;

pub use error::{ServiceError, ServiceResult};
pub use service::{NewOffer, NewRideRequest, Posted, RideService};
pub use worker::start_expiry_worker;
