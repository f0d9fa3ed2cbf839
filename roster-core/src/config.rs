//! Configuration types

use crate::{ConfigError, RosterError, RosterResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default minimum interval between throttled refreshes (5 minutes).
pub const DEFAULT_REFRESH_DELAY_MS: u64 = 300_000;

/// Environment variable holding the refresh interval in milliseconds.
pub const REFRESH_DELAY_ENV: &str = "ROSTER_REFRESH_DELAY_MS";

/// Settings for the entity caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Minimum time between two conditional (non-forced) refreshes.
    pub refresh_delay: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            refresh_delay: Duration::from_millis(DEFAULT_REFRESH_DELAY_MS),
        }
    }
}

impl CacheSettings {
    /// Create settings with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create settings from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `ROSTER_REFRESH_DELAY_MS`: Minimum refresh interval in milliseconds (default: 300000)
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(REFRESH_DELAY_ENV).ok().as_deref())
    }

    /// Build settings from the raw value of `ROSTER_REFRESH_DELAY_MS`.
    ///
    /// Missing or unparsable values fall back to the default.
    pub fn from_env_value(refresh_delay_ms: Option<&str>) -> Self {
        let defaults = Self::default();

        Self {
            refresh_delay: refresh_delay_ms
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.refresh_delay),
        }
    }

    /// Set the minimum refresh interval.
    pub fn with_refresh_delay(mut self, refresh_delay: Duration) -> Self {
        self.refresh_delay = refresh_delay;
        self
    }

    /// Refresh interval in milliseconds, as compared against epoch timestamps.
    pub fn refresh_delay_ms(&self) -> i64 {
        i64::try_from(self.refresh_delay.as_millis()).unwrap_or(i64::MAX)
    }

    /// Validate the settings.
    ///
    /// A zero delay is allowed and disables throttling.
    pub fn validate(&self) -> RosterResult<()> {
        if i64::try_from(self.refresh_delay.as_millis()).is_err() {
            return Err(RosterError::Config(ConfigError::InvalidValue {
                field: "refresh_delay".to_string(),
                value: format!("{:?}", self.refresh_delay),
                reason: "refresh_delay must fit in i64 milliseconds".to_string(),
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_refresh_delay() {
        let settings = CacheSettings::default();
        assert_eq!(settings.refresh_delay, Duration::from_secs(300));
        assert_eq!(settings.refresh_delay_ms(), 300_000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_env_value_parsed_as_millis() {
        let settings = CacheSettings::from_env_value(Some("1500"));
        assert_eq!(settings.refresh_delay, Duration::from_millis(1500));

        let padded = CacheSettings::from_env_value(Some(" 42 "));
        assert_eq!(padded.refresh_delay, Duration::from_millis(42));
    }

    #[test]
    fn test_env_value_falls_back_to_default() {
        let default = Duration::from_millis(DEFAULT_REFRESH_DELAY_MS);
        assert_eq!(CacheSettings::from_env_value(None).refresh_delay, default);
        assert_eq!(CacheSettings::from_env_value(Some("abc")).refresh_delay, default);
        assert_eq!(CacheSettings::from_env_value(Some("-5")).refresh_delay, default);
        assert_eq!(CacheSettings::from_env_value(Some("")).refresh_delay, default);
    }

    #[test]
    fn test_zero_delay_is_valid() {
        let settings = CacheSettings::new().with_refresh_delay(Duration::ZERO);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.refresh_delay_ms(), 0);
    }

    #[test]
    fn test_oversized_delay_is_rejected() {
        let settings = CacheSettings::new().with_refresh_delay(Duration::MAX);
        let result = settings.validate();
        assert!(matches!(
            result,
            Err(RosterError::Config(ConfigError::InvalidValue { ref field, .. })) if field == "refresh_delay"
        ));
        assert_eq!(settings.refresh_delay_ms(), i64::MAX);
    }

    #[test]
    fn test_settings_serde() {
        let settings = CacheSettings::new().with_refresh_delay(Duration::from_millis(1500));
        let json = serde_json::to_string(&settings).unwrap();
        let back: CacheSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
