//! Coordinator façade and per-name registry.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use stockroom_commerce::InventoryApi;
use stockroom_core::{CoordinatorConfig, StockEntry, StockroomResult};
use stockroom_storage::DurableStore;
use tracing::info;

use crate::stock_cache::{CacheStats, TieredStockCache};
use crate::token::TokenManager;

/// One addressable coordinator: a token manager and a stock cache sharing
/// the same upstream client and durable store.
///
/// Share it as `Arc<StockCoordinator>`; every guarantee about caching and
/// deduplication holds per instance.
#[derive(Debug)]
pub struct StockCoordinator {
    name: String,
    tokens: Arc<TokenManager>,
    stock: TieredStockCache,
}

impl StockCoordinator {
    pub fn new(
        name: impl Into<String>,
        api: Arc<dyn InventoryApi>,
        store: Arc<dyn DurableStore>,
        config: &CoordinatorConfig,
    ) -> StockroomResult<Self> {
        config.validate()?;
        let tokens = Arc::new(TokenManager::new(Arc::clone(&api), Arc::clone(&store), config));
        let stock = TieredStockCache::new(api, store, Arc::clone(&tokens), config);

        Ok(Self {
            name: name.into(),
            tokens,
            stock,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A bearer token with more than the refresh buffer left.
    pub async fn get_commerce_layer_token(&self) -> StockroomResult<String> {
        self.tokens.get_token().await.map(|credential| credential.token)
    }

    /// Current stock for `sku_code`.
    pub async fn check_stock(&self, sku_code: &str) -> StockroomResult<StockEntry> {
        self.stock.check_stock(sku_code).await
    }

    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.stock.stats()
    }
}

/// Opens the durable store backing a named coordinator.
pub type StoreFactory = Box<dyn Fn(&str) -> StockroomResult<Arc<dyn DurableStore>> + Send + Sync>;

/// Hands out exactly one coordinator per logical name.
///
/// Each name gets its own durable store from the factory, so instances
/// never share records.
pub struct CoordinatorRegistry {
    api: Arc<dyn InventoryApi>,
    store_factory: StoreFactory,
    config: CoordinatorConfig,
    instances: DashMap<String, Arc<StockCoordinator>>,
}

impl CoordinatorRegistry {
    pub fn new(
        api: Arc<dyn InventoryApi>,
        store_factory: StoreFactory,
        config: CoordinatorConfig,
    ) -> StockroomResult<Self> {
        config.validate()?;
        Ok(Self {
            api,
            store_factory,
            config,
            instances: DashMap::new(),
        })
    }

    /// The coordinator for `name`, created on first use.
    pub fn get_or_create(&self, name: &str) -> StockroomResult<Arc<StockCoordinator>> {
        match self.instances.entry(name.to_string()) {
            Entry::Occupied(existing) => Ok(Arc::clone(existing.get())),
            Entry::Vacant(vacant) => {
                let store = (self.store_factory)(name)?;
                let coordinator = Arc::new(StockCoordinator::new(
                    name,
                    Arc::clone(&self.api),
                    store,
                    &self.config,
                )?);
                info!(coordinator = name, "Coordinator created");
                vacant.insert(Arc::clone(&coordinator));
                Ok(coordinator)
            }
        }
    }

    /// The coordinator addressed by the configured well-known name.
    pub fn default_instance(&self) -> StockroomResult<Arc<StockCoordinator>> {
        self.get_or_create(&self.config.coordinator_name)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl std::fmt::Debug for CoordinatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoordinatorRegistry")
            .field("config", &self.config)
            .field("instances", &self.instances.len())
            .finish_non_exhaustive()
    }
}
