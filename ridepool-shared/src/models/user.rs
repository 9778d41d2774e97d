use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

/// A caller known to the system, keyed by normalized phone number
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub name: Option<String>,
    pub declared_gender: Option<Gender>,
    pub is_allowed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Minimal user entry for a phone seen for the first time
    pub fn new(phone: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phone,
            name: None,
            declared_gender: None,
            is_allowed: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_gender(mut self, gender: Gender) -> Self {
        self.declared_gender = Some(gender);
        self
    }
}
