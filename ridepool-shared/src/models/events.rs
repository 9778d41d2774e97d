use serde::{Deserialize, Serialize};

use crate::pii::Masked;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RingbackRole {
    Rider,
    Driver,
}

/// Outbound call request emitted when a counter-party should be told about a match
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RingbackEvent {
    pub role: RingbackRole,
    pub to: Masked<String>,
    pub from: String,
    pub callback_url: String,
    pub requested_at: i64,
}
