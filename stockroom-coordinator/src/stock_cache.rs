//! Read-through stock cache.
//!
//! Tiers in strict order, first hit wins:
//!
//! 1. Inflight: join a fetch already running for the SKU
//! 2. Memory: a fresh record held by this instance
//! 3. Durable: a fresh record in the durable store, promoted into memory
//! 4. Upstream: fetch, aggregate, write durable then memory
//!
//! A failed fetch commits nothing to either tier and clears its inflight
//! slot so the next call retries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stockroom_commerce::InventoryApi;
use stockroom_core::{
    CacheRecord, CoordinatorConfig, StockEntry, StockroomResult, Timestamp, UpstreamApiError,
};
use stockroom_storage::{read_json, stock_key, write_json, DurableStore};
use tracing::{debug, warn};

use crate::inflight::{InflightDeduplicator, Registration};
use crate::memory::MemoryTier;
use crate::token::TokenManager;

/// Statistics about stock cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the memory tier.
    pub memory_hits: u64,
    /// Lookups served from the durable tier.
    pub durable_hits: u64,
    /// Lookups that joined a fetch already in flight.
    pub inflight_joins: u64,
    /// Upstream fetches started.
    pub upstream_fetches: u64,
    /// Upstream fetches that failed, including credential and write failures.
    pub upstream_failures: u64,
}

impl CacheStats {
    /// Share of lookups that did not start an upstream fetch (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.memory_hits + self.durable_hits + self.inflight_joins;
        let total = hits + self.upstream_fetches;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    memory_hits: AtomicU64,
    durable_hits: AtomicU64,
    inflight_joins: AtomicU64,
    upstream_fetches: AtomicU64,
    upstream_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            durable_hits: self.durable_hits.load(Ordering::Relaxed),
            inflight_joins: self.inflight_joins.load(Ordering::Relaxed),
            upstream_fetches: self.upstream_fetches.load(Ordering::Relaxed),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
        }
    }
}

/// Everything the upstream tier needs, cloneable into a `'static` future.
#[derive(Clone)]
struct UpstreamFetcher {
    api: Arc<dyn InventoryApi>,
    tokens: Arc<TokenManager>,
    store: Arc<dyn DurableStore>,
    memory: Arc<MemoryTier<StockEntry>>,
    counters: Arc<Counters>,
    ttl: Duration,
    upstream_timeout: Duration,
}

impl UpstreamFetcher {
    async fn fetch_and_cache(self, sku: String) -> StockroomResult<StockEntry> {
        Counters::bump(&self.counters.upstream_fetches);

        match self.fetch_and_store(&sku).await {
            Ok(entry) => {
                debug!(sku = %sku, tier = "upstream", quantity = entry.quantity(), "Stock fetched");
                Ok(entry)
            }
            Err(e) => {
                Counters::bump(&self.counters.upstream_failures);
                warn!(sku = %sku, status = ?e.upstream_status(), error = %e, "Stock fetch failed");
                Err(e)
            }
        }
    }

    async fn fetch_and_store(&self, sku: &str) -> StockroomResult<StockEntry> {
        let credential = self.tokens.get_token().await?;

        let items = tokio::time::timeout(
            self.upstream_timeout,
            self.api.stock_items(&credential.token, sku),
        )
        .await
        .map_err(|_| UpstreamApiError::TimedOut {
            sku: sku.to_string(),
            after_ms: self.upstream_timeout.as_millis() as u64,
        })??;

        let entry = StockEntry::aggregate(sku, items.iter().map(|item| item.quantity));
        let now = Utc::now();
        let record = CacheRecord::new(entry.clone(), now, self.ttl);

        write_json(self.store.as_ref(), &stock_key(sku), &record).await?;
        self.memory.insert(sku, record, now);
        Ok(entry)
    }
}

/// Tiered, deduplicated stock lookups for one coordinator instance.
pub struct TieredStockCache {
    memory: Arc<MemoryTier<StockEntry>>,
    store: Arc<dyn DurableStore>,
    inflight: InflightDeduplicator<StockEntry>,
    counters: Arc<Counters>,
    fetcher: UpstreamFetcher,
}

impl TieredStockCache {
    pub fn new(
        api: Arc<dyn InventoryApi>,
        store: Arc<dyn DurableStore>,
        tokens: Arc<TokenManager>,
        config: &CoordinatorConfig,
    ) -> Self {
        let memory = Arc::new(MemoryTier::new(config.memory_max_entries));
        let counters = Arc::new(Counters::default());
        let fetcher = UpstreamFetcher {
            api,
            tokens,
            store: Arc::clone(&store),
            memory: Arc::clone(&memory),
            counters: Arc::clone(&counters),
            ttl: config.stock_ttl(),
            upstream_timeout: config.upstream_timeout(),
        };

        Self {
            memory,
            store,
            inflight: InflightDeduplicator::new(),
            counters,
            fetcher,
        }
    }

    /// Current stock for `sku`.
    ///
    /// Fails only when the upstream tier is reached and fails.
    pub async fn check_stock(&self, sku: &str) -> StockroomResult<StockEntry> {
        if let Some(pending) = self.inflight.join(sku) {
            Counters::bump(&self.counters.inflight_joins);
            debug!(sku, tier = "inflight", "Joined inflight fetch");
            return pending.await;
        }

        let now = Utc::now();

        if let Some(entry) = self.memory.get_fresh(sku, now) {
            Counters::bump(&self.counters.memory_hits);
            debug!(sku, tier = "memory", "Stock cache hit");
            return Ok(entry);
        }

        if let Some(record) = self.read_durable(sku, now).await {
            Counters::bump(&self.counters.durable_hits);
            debug!(sku, tier = "durable", "Stock cache hit");
            let entry = record.value.clone();
            self.memory.insert(sku, record, now);
            return Ok(entry);
        }

        let fetcher = self.fetcher.clone();
        let key = sku.to_string();
        let (pending, registration) = self
            .inflight
            .register(sku, move || fetcher.fetch_and_cache(key));
        if registration == Registration::Joined {
            Counters::bump(&self.counters.inflight_joins);
            debug!(sku, tier = "inflight", "Joined inflight fetch");
        }
        pending.await
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    /// Number of SKUs with a fetch in flight.
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    /// Number of records held in the memory tier, fresh or not.
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    async fn read_durable(&self, sku: &str, now: Timestamp) -> Option<CacheRecord<StockEntry>> {
        match read_json::<CacheRecord<StockEntry>>(self.store.as_ref(), &stock_key(sku)).await {
            Ok(Some(record)) if record.is_fresh_at(now) => Some(record),
            Ok(_) => None,
            Err(e) => {
                warn!(sku, error = %e, "Ignoring unreadable durable stock record");
                None
            }
        }
    }
}

impl std::fmt::Debug for TieredStockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredStockCache")
            .field("memory_len", &self.memory.len())
            .field("inflight_len", &self.inflight.len())
            .field("stats", &self.stats())
            .finish()
    }
}
