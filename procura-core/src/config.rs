//! Lifecycle configuration

use crate::{ConfigError, ProcuraResult};
use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Near-duplicate assistant messages closer than this are merged.
pub const DEFAULT_CONSOLIDATION_WINDOW_SECS: i64 = 120;

/// How long a supplier has to answer an outbound RFQ (3 days).
pub const DEFAULT_RESPONSE_WINDOW_SECS: i64 = 3 * 24 * 3600;

/// How long past the response deadline a silent thread is marked NO_RESPONSE (4 days).
pub const DEFAULT_NO_RESPONSE_AFTER_SECS: i64 = 4 * 24 * 3600;

/// Timing parameters of the negotiation lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    pub consolidation_window_secs: i64,
    pub response_window_secs: i64,
    pub no_response_after_secs: i64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            consolidation_window_secs: DEFAULT_CONSOLIDATION_WINDOW_SECS,
            response_window_secs: DEFAULT_RESPONSE_WINDOW_SECS,
            no_response_after_secs: DEFAULT_NO_RESPONSE_AFTER_SECS,
        }
    }
}

impl LifecycleConfig {
    /// Create LifecycleConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `PROCURA_CONSOLIDATION_WINDOW_SECS` (default: 120)
    /// - `PROCURA_RESPONSE_WINDOW_SECS` (default: 259200)
    /// - `PROCURA_NO_RESPONSE_AFTER_SECS` (default: 345600)
    pub fn from_env() -> Self {
        Self {
            consolidation_window_secs: env_i64(
                "PROCURA_CONSOLIDATION_WINDOW_SECS",
                DEFAULT_CONSOLIDATION_WINDOW_SECS,
            ),
            response_window_secs: env_i64(
                "PROCURA_RESPONSE_WINDOW_SECS",
                DEFAULT_RESPONSE_WINDOW_SECS,
            ),
            no_response_after_secs: env_i64(
                "PROCURA_NO_RESPONSE_AFTER_SECS",
                DEFAULT_NO_RESPONSE_AFTER_SECS,
            ),
        }
    }

    /// Reject configurations that would make the lifecycle misbehave.
    pub fn validate(&self) -> ProcuraResult<()> {
        if self.consolidation_window_secs < 0 {
            return Err(ConfigError::InvalidValue {
                field: "consolidation_window_secs".to_string(),
                value: self.consolidation_window_secs.to_string(),
                reason: "must not be negative".to_string(),
            }
            .into());
        }
        if self.response_window_secs <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "response_window_secs".to_string(),
                value: self.response_window_secs.to_string(),
                reason: "must be positive".to_string(),
            }
            .into());
        }
        if self.no_response_after_secs < 0 {
            return Err(ConfigError::InvalidValue {
                field: "no_response_after_secs".to_string(),
                value: self.no_response_after_secs.to_string(),
                reason: "must not be negative".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn consolidation_window(&self) -> Duration {
        Duration::seconds(self.consolidation_window_secs)
    }

    pub fn response_window(&self) -> Duration {
        Duration::seconds(self.response_window_secs)
    }

    pub fn no_response_after(&self) -> Duration {
        Duration::seconds(self.no_response_after_secs)
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LifecycleConfig::default();
        assert_eq!(config.consolidation_window(), Duration::seconds(120));
        assert_eq!(config.response_window(), Duration::days(3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_response_window() {
        let config = LifecycleConfig {
            response_window_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
