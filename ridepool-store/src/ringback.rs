use async_trait::async_trait;
use chrono::Utc;
use ridepool_core::{Notifier, NotifyError};
use ridepool_shared::pii::{mask_phone, Masked};
use ridepool_shared::{RingbackEvent, RingbackRole};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::app_config::RingbackConfig;

/// Publishes ringback call requests on a broadcast channel.
///
/// The outbound dialer subscribes and places the call; the callback URL tells
/// it which voice flow to start once the callee picks up.
pub struct RingbackNotifier {
    from_number: Option<String>,
    public_base_url: Option<String>,
    tx: broadcast::Sender<RingbackEvent>,
}

impl RingbackNotifier {
    pub fn new(config: &RingbackConfig) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity.max(1));
        Self {
            from_number: config.from_number.clone(),
            public_base_url: config
                .public_base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RingbackEvent> {
        self.tx.subscribe()
    }

    fn publish(&self, role: RingbackRole, phone: &str) -> Result<(), NotifyError> {
        let from = self
            .from_number
            .clone()
            .ok_or_else(|| NotifyError::NotConfigured("ringback.from_number".into()))?;
        let base = self
            .public_base_url
            .as_ref()
            .ok_or_else(|| NotifyError::NotConfigured("ringback.public_base_url".into()))?;

        let param = match role {
            RingbackRole::Rider => "r",
            RingbackRole::Driver => "d",
        };
        let event = RingbackEvent {
            role,
            to: Masked(phone.to_string()),
            from,
            callback_url: format!("{}/voice/ringback-start?{}={}", base, param, phone),
            requested_at: Utc::now().timestamp(),
        };

        match self.tx.send(event) {
            Ok(listeners) => {
                info!(phone = %mask_phone(phone), ?role, listeners, "Ringback requested");
                Ok(())
            }
            Err(_) => {
                warn!(phone = %mask_phone(phone), ?role, "Ringback dropped, no dialer subscribed");
                Err(NotifyError::NoListeners)
            }
        }
    }
}

#[async_trait]
impl Notifier for RingbackNotifier {
    async fn notify_rider(&self, phone: &str) -> Result<(), NotifyError> {
        self.publish(RingbackRole::Rider, phone)
    }

    async fn notify_driver(&self, phone: &str) -> Result<(), NotifyError> {
        self.publish(RingbackRole::Driver, phone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> RingbackConfig {
        RingbackConfig {
            from_number: Some("0730000000".into()),
            public_base_url: Some("https://rides.example.org/".into()),
            channel_capacity: 8,
        }
    }

    #[tokio::test]
    async fn test_rider_ringback_event() {
        let notifier = RingbackNotifier::new(&configured());
        let mut rx = notifier.subscribe();

        notifier.notify_rider("0501234567").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.role, RingbackRole::Rider);
        assert_eq!(event.to.0, "0501234567");
        assert_eq!(event.from, "0730000000");
        assert_eq!(
            event.callback_url,
            "https://rides.example.org/voice/ringback-start?r=0501234567"
        );
    }

    #[tokio::test]
    async fn test_driver_ringback_uses_driver_param() {
        let notifier = RingbackNotifier::new(&configured());
        let mut rx = notifier.subscribe();

        notifier.notify_driver("0521112222").await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.role, RingbackRole::Driver);
        assert!(event.callback_url.ends_with("?d=0521112222"));
    }

    #[tokio::test]
    async fn test_missing_config_is_reported() {
        let notifier = RingbackNotifier::new(&RingbackConfig::default());
        let _rx = notifier.subscribe();

        let err = notifier.notify_rider("0501234567").await.unwrap_err();
        assert!(matches!(err, NotifyError::NotConfigured(_)));
    }

    #[tokio::test]
    async fn test_no_subscriber_is_reported() {
        let notifier = RingbackNotifier::new(&configured());

        let err = notifier.notify_driver("0501234567").await.unwrap_err();
        assert!(matches!(err, NotifyError::NoListeners));
    }
}
