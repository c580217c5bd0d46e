//! Sliding-window heavy-hitter sketch.
//!
//! A count-min sketch per tick, kept in a ring of `window_size` slots, plus an
//! aggregate table holding the element-wise sum of every live slot. Updates
//! touch one counter per row in the current slot and in the aggregate, so an
//! increment costs O(depth) regardless of traffic volume. Sliding the window
//! subtracts the oldest slot from the aggregate and clears it.
//!
//! Next to the sketch sits a small top-K list refreshed on every increment,
//! which keeps [`FrequencyEstimator::sorted_slice`] at O(K log K).

use ahash::RandomState;
use serde::Serialize;

use crate::breaker::params::SketchParams;
use crate::breaker::BreakerError;

/// A tracked key with its approximate count over the current window.
///
/// The count never undercounts the true number of increments still in the
/// window; hash collisions can make it overcount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeavyHitterEntry {
    pub key: String,
    pub count: u64,
}

/// Approximate per-key frequency counts over the most recent ticks.
///
/// Not internally synchronized: callers share it behind a lock.
pub struct FrequencyEstimator {
    hashers: Box<[RandomState]>,
    width: usize,
    depth: usize,
    /// One `depth * width` counter table per tick, used as a ring.
    slots: Box<[Box<[u64]>]>,
    /// Sum of all slots.
    totals: Box<[u64]>,
    current: usize,
    tick_size: u64,
    tick_fill: u64,
    ticks: u64,
    observed: u64,
    k: usize,
    tracked: Vec<HeavyHitterEntry>,
}

impl FrequencyEstimator {
    /// Build an estimator, failing fast on parameters it cannot honor.
    pub fn new(params: &SketchParams) -> Result<Self, BreakerError> {
        params.validate()?;

        let cells = params
            .width
            .checked_mul(params.depth)
            .ok_or_else(|| BreakerError::InvalidParams("width * depth overflows".into()))?;

        Ok(Self {
            hashers: (0..params.depth).map(|_| RandomState::new()).collect(),
            width: params.width,
            depth: params.depth,
            slots: (0..params.window_size)
                .map(|_| vec![0u64; cells].into_boxed_slice())
                .collect(),
            totals: vec![0u64; cells].into_boxed_slice(),
            current: 0,
            tick_size: params.tick_size,
            tick_fill: 0,
            ticks: 0,
            observed: 0,
            k: params.k,
            tracked: Vec::with_capacity(params.k),
        })
    }

    #[inline]
    fn index(&self, row: usize, key: &str) -> usize {
        let column = (self.hashers[row].hash_one(key) % self.width as u64) as usize;
        row * self.width + column
    }

    /// Count one occurrence of `key` in the current tick.
    ///
    /// Returns `true` once the current tick holds `tick_size` increments, at
    /// which point the caller is expected to evaluate and call [`Self::tick`].
    pub fn incr(&mut self, key: &str) -> bool {
        let mut estimate = u64::MAX;
        for row in 0..self.depth {
            let idx = self.index(row, key);
            let slot = &mut self.slots[self.current][idx];
            *slot = slot.saturating_add(1);
            let total = &mut self.totals[idx];
            *total = total.saturating_add(1);
            estimate = estimate.min(*total);
        }

        self.track(key, estimate);
        self.observed = self.observed.saturating_add(1);
        self.tick_fill += 1;
        self.tick_fill >= self.tick_size
    }

    fn track(&mut self, key: &str, estimate: u64) {
        if let Some(entry) = self.tracked.iter_mut().find(|e| e.key == key) {
            entry.count = estimate;
            return;
        }
        if self.tracked.len() < self.k {
            self.tracked.push(HeavyHitterEntry { key: key.to_owned(), count: estimate });
            return;
        }
        let weakest = self
            .tracked
            .iter_mut()
            .min_by_key(|e| e.count)
            .filter(|e| e.count < estimate);
        if let Some(entry) = weakest {
            entry.key = key.to_owned();
            entry.count = estimate;
        }
    }

    /// Window-level estimate for `key`: the minimum over rows of the aggregate.
    pub fn estimate(&self, key: &str) -> u64 {
        (0..self.depth)
            .map(|row| self.totals[self.index(row, key)])
            .min()
            .unwrap_or(0)
    }

    /// Slide the window by one tick: evict the oldest slot and open a new one.
    pub fn tick(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
        let oldest = &mut self.slots[self.current];
        for (total, count) in self.totals.iter_mut().zip(oldest.iter_mut()) {
            *total = total.saturating_sub(*count);
            *count = 0;
        }
        self.tick_fill = 0;
        self.ticks += 1;

        let mut tracked = std::mem::take(&mut self.tracked);
        for entry in tracked.iter_mut() {
            entry.count = self.estimate(&entry.key);
        }
        tracked.retain(|e| e.count > 0);
        self.tracked = tracked;
    }

    /// Tracked heavy hitters, descending by estimated count.
    pub fn sorted_slice(&self) -> Vec<HeavyHitterEntry> {
        let mut entries = self.tracked.clone();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        entries
    }

    /// Exact number of increments still inside the window.
    pub fn window_total(&self) -> u64 {
        self.totals[..self.width].iter().sum()
    }

    /// Increments recorded in the current, incomplete tick.
    pub fn tick_fill(&self) -> u64 {
        self.tick_fill
    }

    /// Ticks completed since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Increments recorded since construction.
    pub fn observed(&self) -> u64 {
        self.observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::params::SensitivityLevel;

    fn params(k: usize, window_size: usize, tick_size: u64) -> SketchParams {
        SketchParams {
            k,
            window_size,
            tick_size,
            width: 1024,
            depth: 3,
            activation_rps: 1,
            max_share_percent: 50,
        }
    }

    #[test]
    fn test_never_undercounts() {
        let mut est = FrequencyEstimator::new(&SketchParams {
            width: 8,
            depth: 2,
            ..params(4, 4, 10_000)
        })
        .unwrap();

        let mut truth = std::collections::HashMap::new();
        for i in 0..500u64 {
            let key = format!("10.0.0.{}", i % 37);
            est.incr(&key);
            *truth.entry(key).or_insert(0u64) += 1;
        }

        for (key, count) in truth {
            assert!(est.estimate(&key) >= count, "{key} undercounted");
        }
        assert_eq!(est.window_total(), 500);
    }

    #[test]
    fn test_incr_reports_tick_completion() {
        let mut est = FrequencyEstimator::new(&params(2, 2, 3)).unwrap();
        assert!(!est.incr("a"));
        assert!(!est.incr("a"));
        assert!(est.incr("b"));
        est.tick();
        assert_eq!(est.tick_fill(), 0);
        assert!(!est.incr("a"));
    }

    #[test]
    fn test_tick_evicts_oldest_slot() {
        let mut est = FrequencyEstimator::new(&params(2, 2, 100)).unwrap();
        for _ in 0..5 {
            est.incr("a");
        }
        est.tick();
        for _ in 0..3 {
            est.incr("a");
        }
        assert_eq!(est.estimate("a"), 8);

        // first tick falls out of the window
        est.tick();
        assert_eq!(est.estimate("a"), 3);

        est.tick();
        assert_eq!(est.estimate("a"), 0);
        assert!(est.sorted_slice().is_empty());
    }

    #[test]
    fn test_single_slot_window_clears_on_tick() {
        let mut est = FrequencyEstimator::new(&params(2, 1, 3)).unwrap();
        est.incr("a");
        est.incr("a");
        est.incr("b");
        assert_eq!(est.sorted_slice()[0], HeavyHitterEntry { key: "a".into(), count: 2 });
        est.tick();
        assert_eq!(est.window_total(), 0);
        assert_eq!(est.ticks(), 1);
    }

    #[test]
    fn test_sorted_slice_descending_and_bounded() {
        let mut est = FrequencyEstimator::new(&params(3, 4, 10_000)).unwrap();
        for (key, n) in [("a", 1), ("b", 7), ("c", 4), ("d", 9), ("e", 2)] {
            for _ in 0..n {
                est.incr(key);
            }
        }

        let slice = est.sorted_slice();
        assert_eq!(slice.len(), 3);
        let keys: Vec<_> = slice.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["d", "b", "c"]);
        assert!(slice.windows(2).all(|w| w[0].count >= w[1].count));
    }

    #[test]
    fn test_invalid_construction_fails() {
        let base = SensitivityLevel::Low.params();
        assert!(FrequencyEstimator::new(&SketchParams { width: 0, ..base }).is_err());
        assert!(FrequencyEstimator::new(&SketchParams { depth: 0, ..base }).is_err());
        assert!(FrequencyEstimator::new(&SketchParams { window_size: 0, ..base }).is_err());
        assert!(FrequencyEstimator::new(&SketchParams { tick_size: 0, ..base }).is_err());
    }
}
