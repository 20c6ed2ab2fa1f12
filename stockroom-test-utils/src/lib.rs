//! Stockroom Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - A scripted inventory API with call counters, gated latency and
//!   failure injection
//! - A durable store whose reads and writes can be made to fail
//! - Proptest generators for SKUs and stock quantities
//! - Config fixtures

// Re-export core types for convenience
pub use stockroom_core::{
    CacheRecord, CoordinatorConfig, Credential, StockEntry, StockroomError, StockroomResult,
    StorageError, UpstreamApiError, UpstreamAuthError,
};
pub use stockroom_storage::{stock_key, DurableStore, InMemoryDurableStore, TOKEN_KEY};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use stockroom_commerce::{InventoryApi, StockItem, TokenGrant};
use tokio::sync::Semaphore;

// ============================================================================
// MOCK INVENTORY API
// ============================================================================

/// Scripted failure for the next upstream calls.
#[derive(Debug, Clone)]
struct ScriptedFailure {
    status: u16,
    body: String,
    remaining: usize,
}

/// Inventory API double.
///
/// Tokens are issued as `token-1`, `token-2`, ... so tests can tell a
/// refresh from a reuse. Stock queries can be held behind a gate until the
/// test releases them.
#[derive(Debug)]
pub struct MockInventoryApi {
    stock: Mutex<HashMap<String, Vec<i64>>>,
    token_lifetime_secs: AtomicI64,
    token_calls: AtomicUsize,
    stock_calls: AtomicUsize,
    stock_calls_by_sku: Mutex<HashMap<String, usize>>,
    bearer_tokens_seen: Mutex<Vec<String>>,
    token_failure: Mutex<Option<ScriptedFailure>>,
    stock_failure: Mutex<Option<ScriptedFailure>>,
    stock_gate: Option<Semaphore>,
    stock_latency: Mutex<Option<Duration>>,
    token_latency: Mutex<Option<Duration>>,
}

impl Default for MockInventoryApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockInventoryApi {
    pub fn new() -> Self {
        Self {
            stock: Mutex::new(HashMap::new()),
            token_lifetime_secs: AtomicI64::new(3600),
            token_calls: AtomicUsize::new(0),
            stock_calls: AtomicUsize::new(0),
            stock_calls_by_sku: Mutex::new(HashMap::new()),
            bearer_tokens_seen: Mutex::new(Vec::new()),
            token_failure: Mutex::new(None),
            stock_failure: Mutex::new(None),
            stock_gate: None,
            stock_latency: Mutex::new(None),
            token_latency: Mutex::new(None),
        }
    }

    /// Hold every stock query until [`release_stock`](Self::release_stock)
    /// hands out permits.
    pub fn gated() -> Self {
        Self {
            stock_gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Set the per-location quantities returned for a SKU.
    pub fn set_stock(&self, sku: &str, quantities: &[i64]) {
        lock(&self.stock).insert(sku.to_string(), quantities.to_vec());
    }

    /// Lifetime reported with each issued token.
    pub fn set_token_lifetime(&self, secs: i64) {
        self.token_lifetime_secs.store(secs, Ordering::SeqCst);
    }

    /// Delay every stock query by `latency`.
    pub fn set_stock_latency(&self, latency: Duration) {
        *lock(&self.stock_latency) = Some(latency);
    }

    /// Delay every token exchange by `latency`, failed ones included.
    pub fn set_token_latency(&self, latency: Duration) {
        *lock(&self.token_latency) = Some(latency);
    }

    /// Reject the next `times` token exchanges with `status`.
    pub fn fail_token(&self, status: u16, body: &str, times: usize) {
        *lock(&self.token_failure) = Some(ScriptedFailure {
            status,
            body: body.to_string(),
            remaining: times,
        });
    }

    /// Reject the next `times` stock queries with `status`.
    pub fn fail_stock(&self, status: u16, body: &str, times: usize) {
        *lock(&self.stock_failure) = Some(ScriptedFailure {
            status,
            body: body.to_string(),
            remaining: times,
        });
    }

    /// Let `permits` gated stock queries proceed.
    pub fn release_stock(&self, permits: usize) {
        if let Some(gate) = &self.stock_gate {
            gate.add_permits(permits);
        }
    }

    pub fn token_calls(&self) -> usize {
        self.token_calls.load(Ordering::SeqCst)
    }

    pub fn stock_calls(&self) -> usize {
        self.stock_calls.load(Ordering::SeqCst)
    }

    pub fn stock_calls_for(&self, sku: &str) -> usize {
        lock(&self.stock_calls_by_sku).get(sku).copied().unwrap_or(0)
    }

    /// Bearer tokens presented on stock queries, in call order.
    pub fn bearer_tokens_seen(&self) -> Vec<String> {
        lock(&self.bearer_tokens_seen).clone()
    }

    fn take_failure(slot: &Mutex<Option<ScriptedFailure>>) -> Option<(u16, String)> {
        let mut guard = lock(slot);
        let failure = guard.as_mut()?;
        if failure.remaining == 0 {
            *guard = None;
            return None;
        }
        failure.remaining -= 1;
        Some((failure.status, failure.body.clone()))
    }
}

#[async_trait]
impl InventoryApi for MockInventoryApi {
    async fn exchange_token(&self) -> StockroomResult<TokenGrant> {
        let call = self.token_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let latency = *lock(&self.token_latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some((status, body)) = Self::take_failure(&self.token_failure) {
            return Err(UpstreamAuthError::Rejected { status, body }.into());
        }

        Ok(TokenGrant {
            access_token: format!("token-{}", call),
            expires_in: self.token_lifetime_secs.load(Ordering::SeqCst),
            token_type: Some("bearer".to_string()),
            scope: None,
        })
    }

    async fn stock_items(&self, bearer_token: &str, sku_code: &str) -> StockroomResult<Vec<StockItem>> {
        self.stock_calls.fetch_add(1, Ordering::SeqCst);
        *lock(&self.stock_calls_by_sku)
            .entry(sku_code.to_string())
            .or_insert(0) += 1;
        lock(&self.bearer_tokens_seen).push(bearer_token.to_string());

        if let Some(gate) = &self.stock_gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let latency = *lock(&self.stock_latency);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if let Some((status, body)) = Self::take_failure(&self.stock_failure) {
            return Err(UpstreamApiError::Rejected {
                sku: sku_code.to_string(),
                status,
                body,
            }
            .into());
        }

        let quantities = lock(&self.stock).get(sku_code).cloned().unwrap_or_default();
        Ok(quantities.into_iter().map(StockItem::with_quantity).collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// FAULTY DURABLE STORE
// ============================================================================

/// In-memory durable store with switchable read/write failures and
/// per-key write counters.
#[derive(Debug, Default)]
pub struct FaultyDurableStore {
    inner: InMemoryDurableStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes_by_key: Mutex<HashMap<String, usize>>,
    reads: AtomicUsize,
}

impl FaultyDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes_for(&self, key: &str) -> usize {
        lock(&self.writes_by_key).get(key).copied().unwrap_or(0)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableStore for FaultyDurableStore {
    async fn get(&self, key: &str) -> StockroomResult<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Read {
                key: key.to_string(),
                reason: "injected read failure".to_string(),
            }
            .into());
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> StockroomResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Write {
                key: key.to_string(),
                reason: "injected write failure".to_string(),
            }
            .into());
        }
        *lock(&self.writes_by_key).entry(key.to_string()).or_insert(0) += 1;
        self.inner.put(key, value).await
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

/// Coordinator config with production TTLs and a short upstream timeout.
pub fn test_coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig::default().with_upstream_timeout(Duration::from_secs(2))
}

/// Give spawned tasks a chance to reach their first suspension point.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    use proptest::prelude::*;

    /// SKU codes in the shape merchants use: upper-case segments joined by dashes.
    pub fn arb_sku() -> impl Strategy<Value = String> {
        "[A-Z]{2,8}(-[A-Z0-9]{1,4}){0,2}"
    }

    /// Per-location quantities, including the zero and negative values
    /// upstream occasionally reports.
    pub fn arb_quantities() -> impl Strategy<Value = Vec<i64>> {
        prop::collection::vec(-5i64..1_000, 0..12)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_issues_distinct_tokens() {
        let api = MockInventoryApi::new();
        let first = api.exchange_token().await.unwrap();
        let second = api.exchange_token().await.unwrap();
        assert_eq!(first.access_token, "token-1");
        assert_eq!(second.access_token, "token-2");
        assert_eq!(api.token_calls(), 2);
    }

    #[tokio::test]
    async fn test_mock_scripted_failure_runs_out() {
        let api = MockInventoryApi::new();
        api.fail_stock(503, "down", 1);

        assert!(api.stock_items("t", "A").await.is_err());
        assert!(api.stock_items("t", "A").await.is_ok());
        assert_eq!(api.stock_calls_for("A"), 2);
    }

    #[tokio::test]
    async fn test_faulty_store_counts_writes() {
        let store = FaultyDurableStore::new();
        store.put("k", vec![1]).await.unwrap();
        store.set_fail_writes(true);
        assert!(store.put("k", vec![2]).await.is_err());
        assert_eq!(store.writes_for("k"), 1);
        assert_eq!(store.get("k").await.unwrap(), Some(vec![1]));
    }
}
