//! Parser service configuration

use procura_core::{ConfigError, ProcuraResult};
use std::time::Duration;

/// Default timeout for parse and follow-up calls.
pub const DEFAULT_PARSE_TIMEOUT_SECS: u64 = 60;

/// Interactive chat generation may legitimately take minutes.
pub const DEFAULT_CHAT_TIMEOUT_SECS: u64 = 5 * 60;

pub const DEFAULT_USER_AGENT: &str = "PROCURA-Parser/1.0";

/// Connection settings for the external parsing / generation service.
#[derive(Clone)]
pub struct ParserConfig {
    /// Service base URL. `None` disables the integration.
    pub base_url: Option<String>,
    /// Bearer token sent with every request.
    pub api_key: Option<String>,
    pub parse_timeout: Duration,
    pub chat_timeout: Duration,
    pub user_agent: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            parse_timeout: Duration::from_secs(DEFAULT_PARSE_TIMEOUT_SECS),
            chat_timeout: Duration::from_secs(DEFAULT_CHAT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ParserConfig {
    /// Create ParserConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `PROCURA_PARSER_URL`: service base URL (unset = integration disabled)
    /// - `PROCURA_PARSER_API_KEY`: bearer token
    /// - `PROCURA_PARSER_TIMEOUT_SECS` (default: 60)
    /// - `PROCURA_CHAT_TIMEOUT_SECS` (default: 300)
    /// - `PROCURA_PARSER_USER_AGENT`
    pub fn from_env() -> Self {
        let base_url = std::env::var("PROCURA_PARSER_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let api_key = std::env::var("PROCURA_PARSER_API_KEY")
            .ok()
            .filter(|s| !s.is_empty());

        let parse_timeout_secs = std::env::var("PROCURA_PARSER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PARSE_TIMEOUT_SECS);

        let chat_timeout_secs = std::env::var("PROCURA_CHAT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHAT_TIMEOUT_SECS);

        let user_agent = std::env::var("PROCURA_PARSER_USER_AGENT")
            .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());

        Self {
            base_url,
            api_key,
            parse_timeout: Duration::from_secs(parse_timeout_secs),
            chat_timeout: Duration::from_secs(chat_timeout_secs),
            user_agent,
        }
    }

    /// Local service with short timeouts.
    pub fn development() -> Self {
        Self {
            base_url: Some("http://localhost:8090".to_string()),
            api_key: None,
            parse_timeout: Duration::from_secs(10),
            chat_timeout: Duration::from_secs(60),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Production defaults; the URL and key still come from the environment.
    pub fn production() -> Self {
        Self {
            parse_timeout: Duration::from_secs(DEFAULT_PARSE_TIMEOUT_SECS),
            chat_timeout: Duration::from_secs(DEFAULT_CHAT_TIMEOUT_SECS),
            ..Self::from_env()
        }
    }

    pub fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    pub fn validate(&self) -> ProcuraResult<()> {
        if let Some(url) = &self.base_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: "base_url".to_string(),
                    value: url.clone(),
                    reason: "must be an http(s) URL".to_string(),
                }
                .into());
            }
        }
        if self.parse_timeout.is_zero() || self.chat_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                value: "0".to_string(),
                reason: "timeouts must be positive".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

impl std::fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("parse_timeout", &self.parse_timeout)
            .field("chat_timeout", &self.chat_timeout)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unconfigured_and_valid() {
        let config = ParserConfig::default();
        assert!(!config.is_configured());
        assert!(config.validate().is_ok());
        assert_eq!(config.chat_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let config = ParserConfig {
            api_key: Some("sk-very-secret".to_string()),
            ..ParserConfig::development()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn test_validate_rejects_non_http_url() {
        let config = ParserConfig {
            base_url: Some("ftp://parser".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ParserConfig {
            parse_timeout: Duration::ZERO,
            ..ParserConfig::development()
        };
        assert!(config.validate().is_err());
    }
}
