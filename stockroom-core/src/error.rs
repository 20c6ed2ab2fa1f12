//! Error types for stockroom operations
//!
//! Every error is `Clone` so one upstream failure can be handed to every
//! caller joined on the same inflight fetch.

use thiserror::Error;

/// Token exchange failures against the upstream auth endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamAuthError {
    #[error("Token exchange rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Token exchange request failed: {reason}")]
    Transport { reason: String },

    #[error("Invalid token response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Token exchange timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },
}

/// Stock query failures against the upstream inventory API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamApiError {
    #[error("Stock query for {sku} rejected with status {status}: {body}")]
    Rejected {
        sku: String,
        status: u16,
        body: String,
    },

    #[error("Stock query for {sku} failed: {reason}")]
    Transport { sku: String, reason: String },

    #[error("Invalid stock response for {sku}: {reason}")]
    InvalidResponse { sku: String, reason: String },

    #[error("Stock query for {sku} timed out after {after_ms}ms")]
    TimedOut { sku: String, after_ms: u64 },
}

/// Durable store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to open durable store: {reason}")]
    Open { reason: String },

    #[error("Read of {key} failed: {reason}")]
    Read { key: String, reason: String },

    #[error("Write of {key} failed: {reason}")]
    Write { key: String, reason: String },

    #[error("Serialization of {key} failed: {reason}")]
    Serialization { key: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: String, reason: String },
}

/// Master error type for all stockroom errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StockroomError {
    #[error("Upstream auth error: {0}")]
    Auth(#[from] UpstreamAuthError),

    #[error("Upstream API error: {0}")]
    Api(#[from] UpstreamApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl StockroomError {
    /// Upstream HTTP status carried by the error, if any.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Auth(UpstreamAuthError::Rejected { status, .. }) => Some(*status),
            Self::Api(UpstreamApiError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }
}

/// Result type alias for stockroom operations.
pub type StockroomResult<T> = Result<T, StockroomError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display_keeps_status_and_body() {
        let err = UpstreamAuthError::Rejected {
            status: 401,
            body: "{\"errors\":[\"invalid_client\"]}".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("401"));
        assert!(msg.contains("invalid_client"));
    }

    #[test]
    fn test_api_error_display_names_sku() {
        let err = UpstreamApiError::Rejected {
            sku: "TSHIRT-M".to_string(),
            status: 503,
            body: "unavailable".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("TSHIRT-M"));
        assert!(msg.contains("503"));
        assert!(msg.contains("unavailable"));
    }

    #[test]
    fn test_timeout_display() {
        let err = UpstreamApiError::TimedOut {
            sku: "A".to_string(),
            after_ms: 1500,
        };
        assert!(format!("{}", err).contains("1500ms"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "stock_ttl".to_string(),
            value: "0s".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("stock_ttl"));
        assert!(msg.contains("0s"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_stockroom_error_from_variants() {
        let auth = StockroomError::from(UpstreamAuthError::TimedOut { after_ms: 1 });
        assert!(matches!(auth, StockroomError::Auth(_)));

        let api = StockroomError::from(UpstreamApiError::Transport {
            sku: "A".to_string(),
            reason: "reset".to_string(),
        });
        assert!(matches!(api, StockroomError::Api(_)));

        let storage = StockroomError::from(StorageError::Open {
            reason: "denied".to_string(),
        });
        assert!(matches!(storage, StockroomError::Storage(_)));

        let config = StockroomError::from(ConfigError::MissingRequired {
            field: "client_id".to_string(),
        });
        assert!(matches!(config, StockroomError::Config(_)));
    }

    #[test]
    fn test_upstream_status() {
        let auth: StockroomError = UpstreamAuthError::Rejected {
            status: 401,
            body: String::new(),
        }
        .into();
        assert_eq!(auth.upstream_status(), Some(401));

        let api: StockroomError = UpstreamApiError::Rejected {
            sku: "A".to_string(),
            status: 429,
            body: String::new(),
        }
        .into();
        assert_eq!(api.upstream_status(), Some(429));

        let timeout: StockroomError = UpstreamAuthError::TimedOut { after_ms: 5 }.into();
        assert_eq!(timeout.upstream_status(), None);
    }
}
