//! API server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::constants::{
    DEFAULT_API_PORT, DEFAULT_BIND_HOST, DEFAULT_CHAT_POLL_BUDGET_SECS,
    DEFAULT_CHAT_POLL_INTERVAL_MS,
};
use crate::error::{ApiError, ApiResult};

/// HTTP server and request-handling settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_host: String,
    pub port: u16,
    /// Poll interval against the chat ledger after a generation timeout.
    pub chat_poll_interval: Duration,
    /// Total time spent polling before the reply is reported as pending.
    pub chat_poll_budget: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_host: DEFAULT_BIND_HOST.to_string(),
            port: DEFAULT_API_PORT,
            chat_poll_interval: Duration::from_millis(DEFAULT_CHAT_POLL_INTERVAL_MS),
            chat_poll_budget: Duration::from_secs(DEFAULT_CHAT_POLL_BUDGET_SECS),
        }
    }
}

impl ApiConfig {
    /// Create ApiConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `PROCURA_API_BIND` (default: 0.0.0.0)
    /// - `PORT` or `PROCURA_API_PORT` (default: 3000)
    /// - `PROCURA_CHAT_POLL_INTERVAL_MS` (default: 2000)
    /// - `PROCURA_CHAT_POLL_BUDGET_SECS` (default: 30)
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_env() -> Self {
        let bind_host =
            std::env::var("PROCURA_API_BIND").unwrap_or_else(|_| DEFAULT_BIND_HOST.to_string());

        let port = std::env::var("PORT")
            .ok()
            .or_else(|| std::env::var("PROCURA_API_PORT").ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_PORT);

        let chat_poll_interval_ms = std::env::var("PROCURA_CHAT_POLL_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHAT_POLL_INTERVAL_MS);

        let chat_poll_budget_secs = std::env::var("PROCURA_CHAT_POLL_BUDGET_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHAT_POLL_BUDGET_SECS);

        Self {
            bind_host,
            port,
            chat_poll_interval: Duration::from_millis(chat_poll_interval_ms),
            chat_poll_budget: Duration::from_secs(chat_poll_budget_secs),
        }
    }

    /// Loopback binding with a short chat poll.
    pub fn development() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: DEFAULT_API_PORT,
            chat_poll_interval: Duration::from_millis(500),
            chat_poll_budget: Duration::from_secs(10),
        }
    }

    pub fn production() -> Self {
        Self {
            chat_poll_interval: Duration::from_millis(DEFAULT_CHAT_POLL_INTERVAL_MS),
            chat_poll_budget: Duration::from_secs(DEFAULT_CHAT_POLL_BUDGET_SECS),
            ..Self::from_env()
        }
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.chat_poll_interval.is_zero() {
            return Err(ApiError::invalid_input(
                "chat_poll_interval must be positive",
            ));
        }
        if self.chat_poll_interval > self.chat_poll_budget {
            return Err(ApiError::invalid_input(
                "chat_poll_interval must not exceed chat_poll_budget",
            ));
        }
        self.bind_addr().map(|_| ())
    }

    /// Resolve the socket address to listen on.
    pub fn bind_addr(&self) -> ApiResult<SocketAddr> {
        let addr = format!("{}:{}", self.bind_host, self.port);
        addr.parse::<SocketAddr>().map_err(|e| {
            ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ApiConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_development_preset() {
        let config = ApiConfig::development();
        assert_eq!(config.bind_host, "127.0.0.1");
        assert!(config.chat_poll_budget < ApiConfig::default().chat_poll_budget);
    }

    #[test]
    fn test_invalid_bind_host_is_rejected() {
        let config = ApiConfig {
            bind_host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_poll_interval_longer_than_budget_is_rejected() {
        let config = ApiConfig {
            chat_poll_interval: Duration::from_secs(60),
            chat_poll_budget: Duration::from_secs(5),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
