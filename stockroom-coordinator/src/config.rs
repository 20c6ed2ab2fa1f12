//! Application configuration.
//!
//! Loaded from a TOML file when one is given (`--config <path>` or
//! `STOCKROOM_CONFIG`), otherwise assembled from environment variables.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use stockroom_commerce::CommerceConfig;
use stockroom_core::{ConfigError, CoordinatorConfig};

use crate::telemetry::TelemetryConfig;

/// Location and size of the LMDB environment backing the durable tier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Root directory. Each named coordinator gets a subdirectory.
    pub path: PathBuf,
    pub max_size_mb: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./stockroom-data"),
            max_size_mb: 64,
        }
    }
}

impl StoreConfig {
    /// Environment variables:
    /// - `STOCKROOM_STORE_PATH` (default: ./stockroom-data)
    /// - `STOCKROOM_STORE_MAX_SIZE_MB` (default: 64)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            path: std::env::var("STOCKROOM_STORE_PATH")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.path),
            max_size_mb: std::env::var("STOCKROOM_STORE_MAX_SIZE_MB")
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.max_size_mb),
        }
    }

    /// Directory for the coordinator called `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "store.path".to_string(),
            });
        }
        if self.max_size_mb == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store.max_size_mb".to_string(),
                value: self.max_size_mb.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Everything the `stockroom` binary needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub commerce: CommerceConfig,
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load from `path`, else from `STOCKROOM_CONFIG`, else from the
    /// environment. The result is validated.
    pub fn load(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = match path.or_else(config_path_from_env) {
            Some(path) => Self::from_path(&path)?,
            None => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { reason, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                reason,
            },
            other => other,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: "<inline>".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            commerce: CommerceConfig::from_env()?,
            coordinator: CoordinatorConfig::from_env(),
            store: StoreConfig::from_env(),
            telemetry: TelemetryConfig::from_env()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.commerce.validate()?;
        self.coordinator.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("STOCKROOM_CONFIG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}
