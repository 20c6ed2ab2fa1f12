//! Coordinator tuning
//!
//! Durations are kept as integer fields so the struct maps one-to-one onto
//! both environment variables and the TOML config file.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Well-known name of the coordinator every caller in a deployment shares.
pub const DEFAULT_COORDINATOR_NAME: &str = "stock-token-coordinator";

/// Tuning knobs for the token manager and the tiered stock cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Logical name the coordinator is addressed by.
    pub coordinator_name: String,
    /// Lifetime of a cached stock record.
    pub stock_ttl_secs: u64,
    /// Credentials with this much time left or less are refreshed.
    pub token_refresh_buffer_secs: u64,
    /// Upper bound on a single upstream call (token exchange or stock query).
    pub upstream_timeout_ms: u64,
    /// Memory tier capacity before sweeping and eviction kick in.
    pub memory_max_entries: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            coordinator_name: DEFAULT_COORDINATOR_NAME.to_string(),
            stock_ttl_secs: 60,
            token_refresh_buffer_secs: 300,
            upstream_timeout_ms: 10_000,
            memory_max_entries: 10_000,
        }
    }
}

impl CoordinatorConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `STOCKROOM_COORDINATOR_NAME` (default: stock-token-coordinator)
    /// - `STOCKROOM_STOCK_TTL_SECS` (default: 60)
    /// - `STOCKROOM_TOKEN_REFRESH_BUFFER_SECS` (default: 300)
    /// - `STOCKROOM_UPSTREAM_TIMEOUT_MS` (default: 10000)
    /// - `STOCKROOM_MEMORY_MAX_ENTRIES` (default: 10000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            coordinator_name: std::env::var("STOCKROOM_COORDINATOR_NAME")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.coordinator_name),
            stock_ttl_secs: env_parse("STOCKROOM_STOCK_TTL_SECS").unwrap_or(defaults.stock_ttl_secs),
            token_refresh_buffer_secs: env_parse("STOCKROOM_TOKEN_REFRESH_BUFFER_SECS")
                .unwrap_or(defaults.token_refresh_buffer_secs),
            upstream_timeout_ms: env_parse("STOCKROOM_UPSTREAM_TIMEOUT_MS")
                .unwrap_or(defaults.upstream_timeout_ms),
            memory_max_entries: env_parse("STOCKROOM_MEMORY_MAX_ENTRIES")
                .unwrap_or(defaults.memory_max_entries),
        }
    }

    pub fn stock_ttl(&self) -> Duration {
        Duration::from_secs(self.stock_ttl_secs)
    }

    pub fn token_refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.token_refresh_buffer_secs)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Set the stock record TTL.
    pub fn with_stock_ttl(mut self, ttl: Duration) -> Self {
        self.stock_ttl_secs = ttl.as_secs();
        self
    }

    /// Set the upstream call timeout.
    pub fn with_upstream_timeout(mut self, timeout: Duration) -> Self {
        self.upstream_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the memory tier capacity.
    pub fn with_memory_max_entries(mut self, max: usize) -> Self {
        self.memory_max_entries = max;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - coordinator_name is not blank
    /// - stock_ttl_secs and upstream_timeout_ms are positive
    /// - memory_max_entries > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.coordinator_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "coordinator_name".to_string(),
            });
        }

        if self.stock_ttl_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stock_ttl_secs".to_string(),
                value: self.stock_ttl_secs.to_string(),
                reason: "stock_ttl_secs must be positive".to_string(),
            });
        }

        if self.upstream_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "upstream_timeout_ms".to_string(),
                value: self.upstream_timeout_ms.to_string(),
                reason: "upstream_timeout_ms must be positive".to_string(),
            });
        }

        if self.memory_max_entries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "memory_max_entries".to_string(),
                value: self.memory_max_entries.to_string(),
                reason: "memory_max_entries must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoordinatorConfig::default();
        assert_eq!(config.coordinator_name, DEFAULT_COORDINATOR_NAME);
        assert_eq!(config.stock_ttl(), Duration::from_secs(60));
        assert_eq!(config.token_refresh_buffer(), Duration::from_secs(300));
        assert_eq!(config.upstream_timeout(), Duration::from_secs(10));
        assert_eq!(config.memory_max_entries, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = CoordinatorConfig::default()
            .with_stock_ttl(Duration::from_secs(5))
            .with_upstream_timeout(Duration::from_millis(250))
            .with_memory_max_entries(3);
        assert_eq!(config.stock_ttl_secs, 5);
        assert_eq!(config.upstream_timeout_ms, 250);
        assert_eq!(config.memory_max_entries, 3);
    }

    #[test]
    fn test_validate_rejects_zero_ttl() {
        let config = CoordinatorConfig {
            stock_ttl_secs: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "stock_ttl_secs"));
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = CoordinatorConfig::default().with_memory_max_entries(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_blank_name() {
        let config = CoordinatorConfig {
            coordinator_name: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_zero_refresh_buffer_is_allowed() {
        let config = CoordinatorConfig {
            token_refresh_buffer_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: CoordinatorConfig =
            serde_json::from_str(r#"{"stock_ttl_secs": 30}"#).unwrap();
        assert_eq!(config.stock_ttl_secs, 30);
        assert_eq!(config.token_refresh_buffer_secs, 300);
    }
}
