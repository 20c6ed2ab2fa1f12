//! Durable key layout.
//!
//! Only two kinds of keys are ever written: the single credential slot and
//! one slot per SKU.

/// Key holding the persisted credential.
pub const TOKEN_KEY: &str = "token";

const STOCK_PREFIX: &str = "stock:";

/// Key holding the cached stock record for a SKU.
pub fn stock_key(sku_code: &str) -> String {
    format!("{STOCK_PREFIX}{sku_code}")
}
