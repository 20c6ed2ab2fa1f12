//! Credential, stock and cache record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Convert a std duration into a chrono duration, saturating on overflow.
fn chrono_duration(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

fn saturating_add(at: Timestamp, duration: Duration) -> Timestamp {
    at.checked_add_signed(chrono_duration(duration))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

// ============================================================================
// CREDENTIAL
// ============================================================================

/// Bearer credential for the upstream commerce API.
///
/// A credential is never mutated; a refresh produces a new one.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token.
    pub token: String,
    /// Absolute expiry reported by the provider.
    pub expires_at: Timestamp,
}

impl Credential {
    /// Build a credential from a provider-reported lifetime in seconds.
    pub fn from_lifetime(token: impl Into<String>, issued_at: Timestamp, expires_in_secs: i64) -> Self {
        Self {
            token: token.into(),
            expires_at: saturating_add(issued_at, Duration::from_secs(expires_in_secs.max(0) as u64)),
        }
    }

    /// Time left before the credential expires, zero if already expired.
    pub fn remaining_at(&self, now: Timestamp) -> Duration {
        self.expires_at
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// A credential is usable only while strictly more than `refresh_buffer`
    /// remains before expiry.
    pub fn is_valid_at(&self, now: Timestamp, refresh_buffer: Duration) -> bool {
        self.expires_at.signed_duration_since(now) > chrono_duration(refresh_buffer)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// ============================================================================
// STOCK ENTRY
// ============================================================================

/// Aggregated stock level for one SKU across all stock locations.
///
/// `available` is always `quantity > 0`; the fields are private so the
/// two can never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StockEntryWire")]
pub struct StockEntry {
    sku_code: String,
    quantity: u64,
    available: bool,
}

/// Deserialization shim that re-derives `available` from `quantity`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StockEntryWire {
    sku_code: String,
    quantity: u64,
}

impl From<StockEntryWire> for StockEntry {
    fn from(wire: StockEntryWire) -> Self {
        Self::new(wire.sku_code, wire.quantity)
    }
}

impl StockEntry {
    pub fn new(sku_code: impl Into<String>, quantity: u64) -> Self {
        Self {
            sku_code: sku_code.into(),
            quantity,
            available: quantity > 0,
        }
    }

    /// Sum per-location quantities. Negative values reported upstream are
    /// treated as zero.
    pub fn aggregate<I>(sku_code: impl Into<String>, quantities: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let total = quantities
            .into_iter()
            .map(|q| q.max(0) as u64)
            .fold(0u64, u64::saturating_add);
        Self::new(sku_code, total)
    }

    pub fn sku_code(&self) -> &str {
        &self.sku_code
    }

    pub fn quantity(&self) -> u64 {
        self.quantity
    }

    pub fn available(&self) -> bool {
        self.available
    }
}

// ============================================================================
// CACHE RECORD
// ============================================================================

/// A cached value stamped with an absolute expiry.
///
/// Expired records are inert: they are never served, but nothing promises
/// they are removed promptly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    pub value: T,
    pub expires_at: Timestamp,
}

impl<T> CacheRecord<T> {
    /// Wrap a value that becomes stale `ttl` after `inserted_at`.
    pub fn new(value: T, inserted_at: Timestamp, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: saturating_add(inserted_at, ttl),
        }
    }

    pub fn is_fresh_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }

    pub fn into_value(self) -> T {
        self.value
    }
}
