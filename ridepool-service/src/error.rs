use ridepool_core::CoreError;
use ridepool_shared::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Caller is not allowed to use the service: {0}")]
    CallerNotAllowed(String),

    #[error("Caller does not own {0}")]
    NotOwner(String),

    #[error("No previous ride to duplicate for {0}")]
    NothingToDuplicate(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
