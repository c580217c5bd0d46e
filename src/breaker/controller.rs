//! Per-request orchestration: reject blocked clients, count the rest.

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::breaker::gate::{Detector, GateDecision};
use crate::breaker::params::SketchParams;
use crate::breaker::registry::BlockRegistry;
use crate::breaker::sketch::HeavyHitterEntry;
use crate::breaker::worker::BlockQueue;
use crate::breaker::BreakerError;
use crate::observability::metrics;

/// Outcome for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Rejected,
}

/// Point-in-time view of the breaker, for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerStatus {
    pub enabled: bool,
    pub params: SketchParams,
    pub threshold: u64,
    pub ticks: u64,
    pub observed: u64,
    pub tick_fill: u64,
    pub window_total: u64,
    pub heavy_hitters: Vec<HeavyHitterEntry>,
    pub block_cache_cost: i64,
}

/// The breaker as seen by the request path.
pub struct Controller {
    enabled: bool,
    params: SketchParams,
    threshold: u64,
    detector: Mutex<Detector>,
    registry: Arc<BlockRegistry>,
    queue: BlockQueue,
}

impl Controller {
    pub fn new(
        enabled: bool,
        params: SketchParams,
        registry: Arc<BlockRegistry>,
        queue: BlockQueue,
    ) -> Result<Self, BreakerError> {
        Ok(Self {
            enabled,
            params,
            threshold: params.threshold_count(),
            detector: Mutex::new(Detector::new(&params, Instant::now())?),
            registry,
            queue,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn registry(&self) -> &BlockRegistry {
        &self.registry
    }

    /// Decide whether `client` may proceed. Does not count the request.
    pub fn check(&self, client: &str) -> Verdict {
        if self.enabled && self.registry.is_blocked(client) {
            Verdict::Rejected
        } else {
            Verdict::Pass
        }
    }

    /// Count an accepted request and act on a completed tick.
    pub fn process(&self, client: &str) {
        if !self.enabled {
            return;
        }

        let decision = {
            let mut detector = self.detector.lock().unwrap_or_else(PoisonError::into_inner);
            detector.observe(client, Instant::now())
        };

        if let Some(decision) = decision {
            self.on_tick(decision);
        }
    }

    /// [`Self::check`] followed by [`Self::process`] for passing requests.
    pub fn admit(&self, client: &str) -> Verdict {
        let verdict = self.check(client);
        if verdict == Verdict::Pass {
            self.process(client);
        }
        verdict
    }

    fn on_tick(&self, decision: GateDecision) {
        let observed_rps = decision.observed_rps();
        tracing::debug!(
            gate = decision.label(),
            observed_rps = ?observed_rps,
            threshold = self.threshold,
            "Tick completed"
        );
        metrics::record_tick(decision.label(), observed_rps);

        if let GateDecision::Block { observed_rps, offenders } = decision {
            for offender in offenders {
                tracing::warn!(
                    client = %offender.key,
                    estimate = offender.count,
                    threshold = self.threshold,
                    observed_rps,
                    "Heavy hitter over share threshold, blocking"
                );
                self.queue.submit(offender.key);
            }
        }
    }

    pub fn status(&self) -> BreakerStatus {
        let detector = self.detector.lock().unwrap_or_else(PoisonError::into_inner);
        let estimator = detector.estimator();
        BreakerStatus {
            enabled: self.enabled,
            params: self.params,
            threshold: self.threshold,
            ticks: estimator.ticks(),
            observed: estimator.observed(),
            tick_fill: estimator.tick_fill(),
            window_total: estimator.window_total(),
            heavy_hitters: estimator.sorted_slice(),
            block_cache_cost: self.registry.cache_cost(),
        }
    }
}
