use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub matching: MatchingConfig,
    #[serde(default)]
    pub ringback: RingbackConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MatchingConfig {
    #[serde(default = "default_match_ttl")]
    pub match_ttl_seconds: u64,
}

fn default_match_ttl() -> u64 { 600 }

impl MatchingConfig {
    /// Match TTL, or `None` when expiry is switched off
    pub fn ttl(&self) -> Result<Option<chrono::Duration>, config::ConfigError> {
        if self.match_ttl_seconds == 0 {
            return Ok(None);
        }

        i64::try_from(self.match_ttl_seconds)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .map(Some)
            .ok_or_else(|| {
                config::ConfigError::Message(format!(
                    "matching.match_ttl_seconds is out of range: {}",
                    self.match_ttl_seconds
                ))
            })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RingbackConfig {
    pub from_number: Option<String>,
    pub public_base_url: Option<String>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize { 64 }

impl Default for RingbackConfig {
    fn default() -> Self {
        Self {
            from_number: None,
            public_base_url: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `RIDEPOOL_MATCHING__MATCH_TTL_SECONDS=120`
            .add_source(config::Environment::with_prefix("RIDEPOOL").separator("__"))
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.matching.ttl()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{File, FileFormat};

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = parse("[matching]\n");

        assert_eq!(config.matching.match_ttl_seconds, 600);
        assert_eq!(config.matching.ttl().unwrap(), Some(chrono::Duration::seconds(600)));
        assert_eq!(config.ringback.channel_capacity, 64);
        assert!(config.ringback.from_number.is_none());
    }

    #[test]
    fn test_zero_ttl_disables_expiry() {
        let config = parse(
            r#"
            [matching]
            match_ttl_seconds = 0

            [ringback]
            from_number = "+972500000000"
            public_base_url = "https://rides.example.org"
            "#,
        );

        assert!(config.matching.ttl().unwrap().is_none());
        assert_eq!(config.ringback.from_number.as_deref(), Some("+972500000000"));
    }

    #[test]
    fn test_out_of_range_ttl_is_a_config_error() {
        let config = parse(&format!("[matching]\nmatch_ttl_seconds = {}\n", i64::MAX));

        let err = config.matching.ttl().unwrap_err();
        assert!(matches!(err, config::ConfigError::Message(_)));
    }
}
