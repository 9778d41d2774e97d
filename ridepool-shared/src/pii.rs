use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::error::ModelError;

/// Wrapper for phone numbers and other caller data that should not reach logs.
///
/// `Debug` and `Display` show only the last three characters; serialization
/// keeps the real value so the outbound dialer can use it.
#[derive(Clone, Deserialize)]
pub struct Masked<T>(pub T);

impl<T: fmt::Display> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask_phone(&self.0.to_string()))
    }
}

impl<T: fmt::Display> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&mask_phone(&self.0.to_string()))
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

/// Keep the last three characters, star the rest
pub fn mask_phone(phone: &str) -> String {
    let chars: Vec<char> = phone.chars().collect();
    let visible = chars.len().min(3);
    let hidden = chars.len() - visible;
    let tail: String = chars[hidden..].iter().collect();
    format!("{}{}", "*".repeat(hidden), tail)
}

/// Strip formatting and map the +972 country prefix to a local leading zero
pub fn normalize_phone(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    match cleaned.strip_prefix("+972") {
        Some(local) => format!("0{}", local),
        None => cleaned,
    }
}

/// Normalize and require the local ten digit form `0XXXXXXXXX`
pub fn validate_phone(raw: &str) -> Result<String, ModelError> {
    let phone = normalize_phone(raw);
    let valid = phone.len() == 10
        && phone.starts_with('0')
        && phone.chars().all(|c| c.is_ascii_digit());

    if valid {
        Ok(phone)
    } else {
        Err(ModelError::InvalidPhone(mask_phone(&phone)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_international_prefix() {
        assert_eq!(normalize_phone("+972-50-123-4567"), "0501234567");
        assert_eq!(normalize_phone("050 123 4567"), "0501234567");
    }

    #[test]
    fn test_validate_phone() {
        assert_eq!(validate_phone("+972501234567").unwrap(), "0501234567");
        assert!(validate_phone("12345").is_err());
        assert!(validate_phone("1501234567").is_err());
    }

    #[test]
    fn test_masked_hides_all_but_tail() {
        let phone = Masked("0501234567".to_string());
        assert_eq!(format!("{}", phone), "*******567");
        assert_eq!(format!("{:?}", phone), "*******567");
        assert_eq!(serde_json::to_string(&phone).unwrap(), "\"0501234567\"");
        assert_eq!(mask_phone("12"), "12");
    }
}
