//! Stockroom Commerce - Inventory API Client
//!
//! The upstream side of the coordinator: exchanging client credentials for
//! a bearer token and querying stock items by SKU code. [`InventoryApi`] is
//! the seam the coordinator depends on; [`CommerceLayerClient`] is the
//! reqwest implementation.

pub mod client;
pub mod config;
pub mod types;

pub use client::CommerceLayerClient;
pub use config::CommerceConfig;
pub use types::{StockItem, TokenGrant};

use async_trait::async_trait;
use stockroom_core::StockroomResult;

/// Authenticated access to the upstream commerce API.
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// Exchange the configured client credentials for a bearer token.
    ///
    /// Non-success responses surface as `UpstreamAuthError::Rejected`.
    async fn exchange_token(&self) -> StockroomResult<TokenGrant>;

    /// List stock items whose SKU code equals `sku_code`.
    ///
    /// Non-success responses surface as `UpstreamApiError::Rejected`.
    async fn stock_items(&self, bearer_token: &str, sku_code: &str) -> StockroomResult<Vec<StockItem>>;
}
