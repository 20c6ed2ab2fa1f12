//! In-process memory tier.

use dashmap::DashMap;
use stockroom_core::{CacheRecord, Timestamp};
use tracing::debug;

/// Bounded map of cache records owned by one coordinator instance.
///
/// Reads check freshness; stale records are never returned. When an insert
/// pushes the map past `max_entries`, expired records are swept first and
/// then the records closest to expiry are evicted until the bound holds.
#[derive(Debug)]
pub struct MemoryTier<T> {
    records: DashMap<String, CacheRecord<T>>,
    max_entries: usize,
}

impl<T: Clone> MemoryTier<T> {
    pub fn new(max_entries: usize) -> Self {
        Self {
            records: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// The value under `key` if its record is fresh at `now`.
    pub fn get_fresh(&self, key: &str, now: Timestamp) -> Option<T> {
        self.records
            .get(key)
            .filter(|record| record.is_fresh_at(now))
            .map(|record| record.value.clone())
    }

    /// Insert or replace the record for `key`.
    pub fn insert(&self, key: impl Into<String>, record: CacheRecord<T>, now: Timestamp) {
        self.records.insert(key.into(), record);
        if self.records.len() > self.max_entries {
            self.evict(now);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn evict(&self, now: Timestamp) {
        let before = self.records.len();
        self.records.retain(|_, record| record.is_fresh_at(now));

        while self.records.len() > self.max_entries {
            let victim = self
                .records
                .iter()
                .min_by_key(|record| record.value().expires_at)
                .map(|record| record.key().clone());
            match victim {
                Some(key) => {
                    self.records.remove(&key);
                }
                None => break,
            }
        }

        debug!(
            evicted = before.saturating_sub(self.records.len()),
            remaining = self.records.len(),
            "Memory tier over capacity"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use stockroom_core::StockEntry;

    fn record(quantity: u64, inserted_at: Timestamp, ttl_secs: u64) -> CacheRecord<StockEntry> {
        CacheRecord::new(
            StockEntry::new("A", quantity),
            inserted_at,
            Duration::from_secs(ttl_secs),
        )
    }

    #[test]
    fn test_fresh_record_is_returned() {
        let tier = MemoryTier::new(10);
        let now = Utc::now();
        tier.insert("A", record(4, now, 60), now);

        assert_eq!(tier.get_fresh("A", now), Some(StockEntry::new("A", 4)));
        assert_eq!(tier.get_fresh("B", now), None);
    }

    #[test]
    fn test_stale_record_is_never_returned() {
        let tier = MemoryTier::new(10);
        let now = Utc::now();
        tier.insert("A", record(4, now, 60), now);

        let at_expiry = now + chrono::Duration::seconds(60);
        assert_eq!(tier.get_fresh("A", at_expiry), None);
        // Still stored; removal is not prompt.
        assert_eq!(tier.len(), 1);
    }

    #[test]
    fn test_insert_replaces() {
        let tier = MemoryTier::new(10);
        let now = Utc::now();
        tier.insert("A", record(1, now, 60), now);
        tier.insert("A", record(2, now, 60), now);

        assert_eq!(tier.len(), 1);
        assert_eq!(tier.get_fresh("A", now).map(|e| e.quantity()), Some(2));
    }

    #[test]
    fn test_over_capacity_sweeps_expired_first() {
        let tier = MemoryTier::new(2);
        let now = Utc::now();
        let long_ago = now - chrono::Duration::seconds(600);

        tier.insert("old", record(1, long_ago, 60), now);
        tier.insert("a", record(2, now, 60), now);
        tier.insert("b", record(3, now, 60), now);

        assert_eq!(tier.len(), 2);
        assert!(tier.get_fresh("a", now).is_some());
        assert!(tier.get_fresh("b", now).is_some());
    }

    #[test]
    fn test_over_capacity_evicts_soonest_expiring() {
        let tier = MemoryTier::new(2);
        let now = Utc::now();

        tier.insert("short", record(1, now, 10), now);
        tier.insert("long", record(2, now, 120), now);
        tier.insert("mid", record(3, now, 60), now);

        assert_eq!(tier.len(), 2);
        assert!(tier.get_fresh("short", now).is_none());
        assert!(tier.get_fresh("long", now).is_some());
        assert!(tier.get_fresh("mid", now).is_some());
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let tier: MemoryTier<StockEntry> = MemoryTier::new(0);
        assert_eq!(tier.max_entries(), 1);
    }

    #[test]
    fn test_concurrent_inserts_past_capacity() {
        let tier = std::sync::Arc::new(MemoryTier::new(4));
        let now = Utc::now();

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let tier = std::sync::Arc::clone(&tier);
                std::thread::spawn(move || {
                    for i in 0..200u64 {
                        tier.insert(format!("{}-{}", worker, i), record(i, now, 10 + i), now);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("insert thread panicked");
        }

        assert!(tier.len() <= tier.max_entries() + 8);
    }
}
