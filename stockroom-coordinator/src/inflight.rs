//! Inflight request deduplication.
//!
//! At most one producer runs per key at a time. Every caller that arrives
//! while it runs awaits the same shared handle and receives the same
//! outcome, success or error.
//!
//! The slot is removed by a drop guard owned by the shared future, so the
//! cleanup runs whether the producer returns `Ok`, returns `Err`, times
//! out, panics, or is dropped.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use stockroom_core::StockroomResult;

/// Handle on an inflight operation. Cloning it is cheap; every clone
/// resolves to the same result.
pub type InflightHandle<V> = Shared<BoxFuture<'static, StockroomResult<V>>>;

type Slots<V> = DashMap<String, InflightSlot<V>>;

struct InflightSlot<V: Clone> {
    generation: u64,
    handle: InflightHandle<V>,
}

/// Whether a registration started new work or joined existing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Started,
    Joined,
}

/// Per-key single-flight executor.
pub struct InflightDeduplicator<V: Clone> {
    slots: Arc<Slots<V>>,
    generation: AtomicU64,
}

impl<V> Default for InflightDeduplicator<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> InflightDeduplicator<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Run `producer` for `key` unless a run is already in flight, in which
    /// case wait for that run instead.
    pub async fn dedupe<F, Fut>(&self, key: &str, producer: F) -> StockroomResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StockroomResult<V>> + Send + 'static,
    {
        let (handle, _) = self.register(key, producer);
        handle.await
    }

    /// Handle on the run currently in flight for `key`, if any.
    pub fn join(&self, key: &str) -> Option<InflightHandle<V>> {
        self.slots.get(key).map(|slot| slot.handle.clone())
    }

    pub fn is_inflight(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of keys with a run in flight.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Atomically join the slot for `key` or install a new one wrapping
    /// `producer`.
    ///
    /// `producer` is called while the map shard is locked, so it must only
    /// build the future and not touch this deduplicator.
    pub fn register<F, Fut>(&self, key: &str, producer: F) -> (InflightHandle<V>, Registration)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = StockroomResult<V>> + Send + 'static,
    {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(slot) => (slot.get().handle.clone(), Registration::Joined),
            Entry::Vacant(vacant) => {
                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let guard = SlotGuard {
                    slots: Arc::downgrade(&self.slots),
                    key: key.to_string(),
                    generation,
                };
                let work = producer();
                let handle = async move {
                    let _guard = guard;
                    work.await
                }
                .boxed()
                .shared();

                vacant.insert(InflightSlot {
                    generation,
                    handle: handle.clone(),
                });
                (handle, Registration::Started)
            }
        }
    }
}

/// Removes its slot when the wrapped work settles or is dropped.
struct SlotGuard<V: Clone> {
    slots: Weak<Slots<V>>,
    key: String,
    generation: u64,
}

impl<V: Clone> Drop for SlotGuard<V> {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.upgrade() {
            slots.remove_if(&self.key, |_, slot| slot.generation == self.generation);
        }
    }
}
