//! Stockroom Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! credentials, stock entries, TTL-stamped cache records, the error
//! taxonomy and the coordinator tuning knobs. No I/O lives here.

pub mod config;
pub mod entities;
pub mod error;

pub use config::{CoordinatorConfig, DEFAULT_COORDINATOR_NAME};
pub use entities::{CacheRecord, Credential, StockEntry, Timestamp};
pub use error::{
    ConfigError, StockroomError, StockroomResult, StorageError, UpstreamApiError,
    UpstreamAuthError,
};
