//! Commerce API client configuration.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use stockroom_core::ConfigError;

/// Connection settings for the Commerce Layer organization.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommerceConfig {
    /// Organization base URL, e.g. `https://acme.commercelayer.io`.
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Optional market scope sent with the token exchange.
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl CommerceConfig {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: SecretString::from(client_secret.into()),
            scope: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }

    /// Create from environment variables.
    ///
    /// Environment variables:
    /// - `STOCKROOM_COMMERCE_BASE_URL` (required)
    /// - `STOCKROOM_COMMERCE_CLIENT_ID` (required)
    /// - `STOCKROOM_COMMERCE_CLIENT_SECRET` (required)
    /// - `STOCKROOM_COMMERCE_SCOPE` (optional)
    /// - `STOCKROOM_COMMERCE_TIMEOUT_MS` (default: 10000)
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            base_url: required_env("STOCKROOM_COMMERCE_BASE_URL")?,
            client_id: required_env("STOCKROOM_COMMERCE_CLIENT_ID")?,
            client_secret: SecretString::from(required_env("STOCKROOM_COMMERCE_CLIENT_SECRET")?),
            scope: std::env::var("STOCKROOM_COMMERCE_SCOPE")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            request_timeout_ms: std::env::var("STOCKROOM_COMMERCE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_request_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Base URL without a trailing slash.
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "base_url".to_string(),
            });
        }
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                value: self.base_url.clone(),
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "client_id".to_string(),
            });
        }
        if self.client_secret.expose_secret().trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "client_secret".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms".to_string(),
                value: self.request_timeout_ms.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

fn required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingRequired {
            field: key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> CommerceConfig {
        CommerceConfig::new("https://acme.commercelayer.io/", "client", "secret")
    }

    #[test]
    fn test_valid_config() {
        let config = valid();
        assert!(config.validate().is_ok());
        assert_eq!(config.normalized_base_url(), "https://acme.commercelayer.io");
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config = valid();
        config.base_url = "acme.commercelayer.io".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "base_url"
        ));
    }

    #[test]
    fn test_rejects_blank_secret() {
        let config = CommerceConfig::new("https://acme.commercelayer.io", "client", " ");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired { ref field }) if field == "client_secret"
        ));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = valid();
        config.request_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let debug = format!("{:?}", valid());
        assert!(!debug.contains("\"secret\""));
        assert!(debug.contains("client"));
    }
}
