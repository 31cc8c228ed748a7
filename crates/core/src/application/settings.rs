// Manager settings - every timer and bound the core uses, in one place

use super::constants::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the pool, executor and lifecycle operations
///
/// Deserializes from the `[settings]` table of the daemon configuration;
/// every field is optional and falls back to the defaults in `constants`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    pub session_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub settle_interval_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            session_timeout_ms: DEFAULT_SESSION_TIMEOUT.as_millis() as u64,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY.as_millis() as u64,
            settle_interval_ms: DEFAULT_SETTLE_INTERVAL.as_millis() as u64,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL.as_millis() as u64,
        }
    }
}

impl ManagerSettings {
    /// Settings with every wait shrunk to zero, for tests
    pub fn immediate() -> Self {
        Self {
            retry_delay_ms: 0,
            settle_interval_ms: 0,
            ..Self::default()
        }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = ManagerSettings::default();
        assert_eq!(settings.session_timeout(), Duration::from_secs(300));
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.retry_delay(), Duration::from_secs(2));
        assert_eq!(settings.settle_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let settings: ManagerSettings =
            serde_json::from_str(r#"{"max_attempts": 5, "retry_delay_ms": 10}"#).unwrap();
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.retry_delay(), Duration::from_millis(10));
        assert_eq!(settings.session_timeout(), DEFAULT_SESSION_TIMEOUT);
    }
}
