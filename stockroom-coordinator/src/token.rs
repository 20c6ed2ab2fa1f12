//! Bearer credential lifecycle.
//!
//! Lookup order: the credential held in memory, then the copy persisted in
//! the durable store, then a fresh client-credentials exchange. A
//! credential with the refresh buffer or less remaining is treated as
//! invalid at every step.
//!
//! The durable lookup and the exchange run as one refresh keyed on
//! [`TOKEN_KEY`]. Callers arriving while it runs share its outcome, success
//! or error, so no caller waits on more than one exchange.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stockroom_commerce::InventoryApi;
use stockroom_core::{
    CoordinatorConfig, Credential, StockroomResult, Timestamp, UpstreamAuthError,
};
use stockroom_storage::{read_json, write_json, DurableStore, TOKEN_KEY};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::inflight::InflightDeduplicator;

/// Owns the coordinator's bearer credential.
pub struct TokenManager {
    refresher: CredentialRefresher,
    refreshes: InflightDeduplicator<Credential>,
}

/// Everything a refresh needs, cloneable into the shared refresh future.
#[derive(Clone)]
struct CredentialRefresher {
    api: Arc<dyn InventoryApi>,
    store: Arc<dyn DurableStore>,
    current: Arc<RwLock<Option<Credential>>>,
    refresh_buffer: Duration,
    upstream_timeout: Duration,
}

impl TokenManager {
    pub fn new(
        api: Arc<dyn InventoryApi>,
        store: Arc<dyn DurableStore>,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            refresher: CredentialRefresher {
                api,
                store,
                current: Arc::new(RwLock::new(None)),
                refresh_buffer: config.token_refresh_buffer(),
                upstream_timeout: config.upstream_timeout(),
            },
            refreshes: InflightDeduplicator::new(),
        }
    }

    /// Return a credential with more than the refresh buffer left.
    ///
    /// Makes at most one upstream call. On failure nothing is committed to
    /// memory or the durable store, and every caller that joined the failed
    /// refresh receives the same error.
    pub async fn get_token(&self) -> StockroomResult<Credential> {
        if let Some(credential) = self.refresher.valid_in_memory(Utc::now()).await {
            return Ok(credential);
        }

        let refresher = self.refresher.clone();
        self.refreshes
            .dedupe(TOKEN_KEY, move || refresher.refresh())
            .await
    }

    /// The credential held in memory, valid or not.
    pub async fn cached(&self) -> Option<Credential> {
        self.refresher.current.read().await.clone()
    }

    pub fn refresh_buffer(&self) -> Duration {
        self.refresher.refresh_buffer
    }

    /// Whether a refresh is running right now.
    pub fn is_refreshing(&self) -> bool {
        self.refreshes.is_inflight(TOKEN_KEY)
    }
}

impl CredentialRefresher {
    async fn valid_in_memory(&self, now: Timestamp) -> Option<Credential> {
        self.current
            .read()
            .await
            .as_ref()
            .filter(|credential| credential.is_valid_at(now, self.refresh_buffer))
            .cloned()
    }

    async fn refresh(self) -> StockroomResult<Credential> {
        let now = Utc::now();

        // A refresh that settled between our memory check and registration.
        if let Some(credential) = self.valid_in_memory(now).await {
            return Ok(credential);
        }

        if let Some(persisted) = self.load_persisted(now).await {
            debug!(expires_at = %persisted.expires_at, "Adopted persisted credential");
            *self.current.write().await = Some(persisted.clone());
            return Ok(persisted);
        }

        let credential = self.exchange().await?;
        write_json(self.store.as_ref(), TOKEN_KEY, &credential).await?;
        info!(expires_at = %credential.expires_at, "Refreshed commerce credential");
        *self.current.write().await = Some(credential.clone());
        Ok(credential)
    }

    async fn load_persisted(&self, now: Timestamp) -> Option<Credential> {
        match read_json::<Credential>(self.store.as_ref(), TOKEN_KEY).await {
            Ok(Some(credential)) if credential.is_valid_at(now, self.refresh_buffer) => {
                Some(credential)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable persisted credential");
                None
            }
        }
    }

    async fn exchange(&self) -> StockroomResult<Credential> {
        let issued_at = Utc::now();
        let grant = tokio::time::timeout(self.upstream_timeout, self.api.exchange_token())
            .await
            .map_err(|_| UpstreamAuthError::TimedOut {
                after_ms: self.upstream_timeout.as_millis() as u64,
            })??;

        if grant.access_token.is_empty() {
            return Err(UpstreamAuthError::InvalidResponse {
                reason: "token response carried an empty access_token".to_string(),
            }
            .into());
        }

        Ok(Credential::from_lifetime(
            grant.access_token,
            issued_at,
            grant.expires_in,
        ))
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("refresh_buffer", &self.refresher.refresh_buffer)
            .field("upstream_timeout", &self.refresher.upstream_timeout)
            .field("refreshing", &self.is_refreshing())
            .finish_non_exhaustive()
    }
}
