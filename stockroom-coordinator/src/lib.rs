//! Stockroom Coordinator
//!
//! The single addressable unit that owns the commerce API credential and
//! serves stock lookups through inflight, memory, durable and upstream
//! tiers, issuing at most one upstream fetch per SKU at a time.
//!
//! ```ignore
//! let registry = CoordinatorRegistry::new(api, store_factory, CoordinatorConfig::default())?;
//! let coordinator = registry.default_instance()?;
//! let entry = coordinator.check_stock("TSHIRT-M").await?;
//! ```

pub mod config;
pub mod coordinator;
pub mod inflight;
pub mod memory;
pub mod stock_cache;
pub mod telemetry;
pub mod token;

pub use config::{AppConfig, StoreConfig};
pub use coordinator::{CoordinatorRegistry, StockCoordinator, StoreFactory};
pub use inflight::{InflightDeduplicator, InflightHandle, Registration};
pub use memory::MemoryTier;
pub use stock_cache::{CacheStats, TieredStockCache};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
pub use token::TokenManager;
