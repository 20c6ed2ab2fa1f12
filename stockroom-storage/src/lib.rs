//! Stockroom Storage - Durable Store
//!
//! The durable tier of the coordinator: a string-keyed byte store that
//! survives coordinator restarts. Two implementations ship here:
//!
//! - [`InMemoryDurableStore`] for tests and single-process deployments
//! - [`LmdbDurableStore`] backed by LMDB through heed
//!
//! Values are JSON. [`read_json`] and [`write_json`] do the encoding so
//! the coordinator never touches raw bytes.

pub mod keys;
pub mod lmdb;
pub mod store;

pub use keys::{stock_key, TOKEN_KEY};
pub use lmdb::{LmdbDurableStore, LmdbStoreError};
pub use store::{read_json, write_json, DurableStore, InMemoryDurableStore};
