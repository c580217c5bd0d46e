//! Time-bucketed registry of blocked clients.
//!
//! Block entries are keyed by `(client, bucket)`, where a bucket is a fixed
//! wall-clock interval. Lookups only ever read the bucket containing "now".
//! A block issued close to a bucket boundary is therefore written twice:
//!
//! ```text
//!              boundary
//!   bucket b      |      bucket b+1
//!   ----[====block_duration====]----
//!       ^ttl = block_duration
//!                 [=spill=]  ttl = block_duration - time_to_boundary
//! ```
//!
//! Without the second entry the block would vanish the moment the boundary is
//! crossed.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::cache::{BlockCache, BlockEntry};
use crate::breaker::clock::Clock;
use crate::breaker::BreakerError;

/// Cost charged per block entry.
const ENTRY_COST: i64 = 1;

/// Where a block was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReceipt {
    pub bucket: u64,
    /// TTL of the entry written into the following bucket, if one was needed.
    pub spill: Option<Duration>,
}

/// Records and answers "is this client blocked right now".
pub struct BlockRegistry {
    cache: Arc<dyn BlockCache>,
    clock: Arc<dyn Clock>,
    block_duration: Duration,
    bucket_width: Duration,
}

impl BlockRegistry {
    /// `bucket_width` must be non-zero; config validation enforces it.
    pub fn new(
        cache: Arc<dyn BlockCache>,
        clock: Arc<dyn Clock>,
        block_duration: Duration,
        bucket_width: Duration,
    ) -> Self {
        Self {
            cache,
            clock,
            block_duration,
            bucket_width: bucket_width.max(Duration::from_millis(1)),
        }
    }

    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }

    /// Total cost held by the backing cache.
    pub fn cache_cost(&self) -> i64 {
        self.cache.cost()
    }

    fn bucket_at(&self, now: Duration) -> u64 {
        (now.as_millis() / self.bucket_width.as_millis()) as u64
    }

    fn bucket_start(&self, bucket: u64) -> Duration {
        Duration::from_millis(bucket.saturating_mul(self.bucket_width.as_millis() as u64))
    }

    fn entry_key(client: &str, bucket: u64) -> String {
        format!("{client}#{bucket}")
    }

    /// Block `client` for the configured duration starting now.
    ///
    /// Writing the same client again simply overwrites the entries; the later
    /// write determines expiry.
    pub fn block(&self, client: &str) -> Result<BlockReceipt, BreakerError> {
        let now = self.clock.now();
        let bucket = self.bucket_at(now);
        let entry = BlockEntry { blocked_at: now.as_secs() };

        if !self.cache.set_with_ttl(Self::entry_key(client, bucket), entry, ENTRY_COST, self.block_duration) {
            tracing::error!(client = %client, bucket, "Block cache write refused");
            return Err(BreakerError::CacheWrite { client: client.to_owned(), bucket });
        }

        let until_boundary = self.bucket_start(bucket + 1).saturating_sub(now);
        let spill = self.block_duration.saturating_sub(until_boundary);
        if spill.is_zero() {
            return Ok(BlockReceipt { bucket, spill: None });
        }

        let next = bucket + 1;
        if !self.cache.set_with_ttl(Self::entry_key(client, next), entry, ENTRY_COST, spill) {
            tracing::error!(client = %client, bucket = next, "Block cache write refused for spill bucket");
            return Err(BreakerError::CacheWrite { client: client.to_owned(), bucket: next });
        }

        Ok(BlockReceipt { bucket, spill: Some(spill) })
    }

    /// Whether `client` is blocked in the current bucket. No side effects.
    pub fn is_blocked(&self, client: &str) -> bool {
        let bucket = self.bucket_at(self.clock.now());
        self.cache.get(&Self::entry_key(client, bucket)).is_some()
    }
}
