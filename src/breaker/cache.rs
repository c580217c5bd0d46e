//! TTL cache holding block entries.
//!
//! The registry only needs `get` and `set_with_ttl` with idempotent overwrite
//! and eventual visibility, so the cache sits behind the [`BlockCache`] trait.
//! [`TtlCache`] is the in-process implementation: a `DashMap` with per-entry
//! deadlines and a total cost budget.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::breaker::clock::Clock;

/// Value stored for a blocked key in one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockEntry {
    /// When the block was issued, seconds since the UNIX epoch.
    pub blocked_at: u64,
}

/// Concurrent cache contract consumed by the block registry.
pub trait BlockCache: Send + Sync {
    /// Look up a live entry.
    fn get(&self, key: &str) -> Option<BlockEntry>;

    /// Insert or overwrite `key`. Returns `false` when the write was refused.
    fn set_with_ttl(&self, key: String, value: BlockEntry, cost: i64, ttl: Duration) -> bool;

    /// Total cost of entries currently held.
    fn cost(&self) -> i64;
}

struct Slot {
    value: BlockEntry,
    cost: i64,
    expires_at: Duration,
}

/// In-memory TTL cache with a cost ceiling.
///
/// Expired entries are dropped lazily on read and swept when a write would
/// exceed the budget. A write that still does not fit is refused.
pub struct TtlCache {
    entries: DashMap<String, Slot>,
    used: AtomicI64,
    max_cost: i64,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(max_cost: i64, clock: Arc<dyn Clock>) -> Self {
        Self { entries: DashMap::new(), used: AtomicI64::new(0), max_cost, clock }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = self.clock.now();
        self.entries.retain(|_, slot| {
            let live = slot.expires_at > now;
            if !live {
                self.used.fetch_sub(slot.cost, Ordering::Relaxed);
            }
            live
        });
    }

    fn fits(&self, extra: i64) -> bool {
        self.used.load(Ordering::Relaxed).saturating_add(extra) <= self.max_cost
    }
}

impl BlockCache for TtlCache {
    fn get(&self, key: &str) -> Option<BlockEntry> {
        let now = self.clock.now();
        {
            let slot = self.entries.get(key)?;
            if slot.expires_at > now {
                return Some(slot.value);
            }
        }
        // shard guard released above; remove_if would deadlock otherwise
        if let Some((_, slot)) = self.entries.remove_if(key, |_, s| s.expires_at <= now) {
            self.used.fetch_sub(slot.cost, Ordering::Relaxed);
        }
        None
    }

    fn set_with_ttl(&self, key: String, value: BlockEntry, cost: i64, ttl: Duration) -> bool {
        if ttl.is_zero() || cost < 0 || cost > self.max_cost {
            return false;
        }

        let previous_cost = self.entries.get(&key).map(|s| s.cost).unwrap_or(0);
        let extra = cost - previous_cost;
        if !self.fits(extra) {
            self.purge_expired();
            if !self.fits(extra) {
                return false;
            }
        }

        let slot = Slot { value, cost, expires_at: self.clock.now() + ttl };
        match self.entries.insert(key, slot) {
            Some(old) => self.used.fetch_add(cost - old.cost, Ordering::Relaxed),
            None => self.used.fetch_add(cost, Ordering::Relaxed),
        };
        true
    }

    fn cost(&self) -> i64 {
        self.used.load(Ordering::Relaxed)
    }
}
