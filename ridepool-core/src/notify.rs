use async_trait::async_trait;

/// Best-effort outbound contact to a phone number.
///
/// Implementations report failures, callers log and drop them: a failed
/// notification never undoes a persisted match.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_rider(&self, phone: &str) -> Result<(), NotifyError>;

    async fn notify_driver(&self, phone: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Notifier is not configured: missing {0}")]
    NotConfigured(String),

    #[error("No dialer is listening for ringback events")]
    NoListeners,

    #[error("Delivery failed: {0}")]
    Delivery(String),
}
