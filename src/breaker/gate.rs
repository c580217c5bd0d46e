//! Two-gate blocking policy evaluated once per completed tick.
//!
//! # Gates
//! ```text
//! Gate 1 (load):  tick_size / elapsed_secs >= activation_rps
//! Gate 2 (share): estimate > floor(window_size * tick_size * max_share_percent / 100)
//! ```
//!
//! Both must hold for a key to be blocked. Gate 2 reads the window as it was
//! before the tick slides it. The window slides whether or not either gate holds.

use std::time::Instant;

use crate::breaker::params::SketchParams;
use crate::breaker::sketch::{FrequencyEstimator, HeavyHitterEntry};
use crate::breaker::BreakerError;

/// Outcome of a single gate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// No prior tick boundary, or zero elapsed time: rate is unknown.
    InsufficientData,
    /// Load below the activation rate.
    LoadGateClosed { observed_rps: f64 },
    /// Load is high but no key holds an excessive share.
    NoHeavyHitters { observed_rps: f64 },
    /// Keys to block, in descending order of estimated count.
    Block { observed_rps: f64, offenders: Vec<HeavyHitterEntry> },
}

impl GateDecision {
    pub fn observed_rps(&self) -> Option<f64> {
        match self {
            Self::InsufficientData => None,
            Self::LoadGateClosed { observed_rps }
            | Self::NoHeavyHitters { observed_rps }
            | Self::Block { observed_rps, .. } => Some(*observed_rps),
        }
    }

    /// Keys to block; empty unless both gates held.
    pub fn into_keys(self) -> Vec<String> {
        match self {
            Self::Block { offenders, .. } => offenders.into_iter().map(|e| e.key).collect(),
            _ => Vec::new(),
        }
    }

    /// Label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::InsufficientData => "insufficient_data",
            Self::LoadGateClosed { .. } => "load_gate_closed",
            Self::NoHeavyHitters { .. } => "no_heavy_hitters",
            Self::Block { .. } => "blocking",
        }
    }
}

/// Decides, at each tick boundary, whether any key should be blocked.
#[derive(Debug, Clone)]
pub struct GateEvaluator {
    tick_size: u64,
    activation_rps: u64,
    threshold: u64,
    last_tick: Option<Instant>,
}

impl GateEvaluator {
    /// Evaluator with no prior tick boundary. The first evaluation fails Gate 1.
    pub fn new(params: &SketchParams) -> Self {
        Self {
            tick_size: params.tick_size,
            activation_rps: params.activation_rps,
            threshold: params.threshold_count(),
            last_tick: None,
        }
    }

    /// Evaluator whose first tick is measured from `started`.
    pub fn starting_at(params: &SketchParams, started: Instant) -> Self {
        Self { last_tick: Some(started), ..Self::new(params) }
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Evaluate the gates against the pre-tick window, then slide it.
    pub fn evaluate(&mut self, estimator: &mut FrequencyEstimator, now: Instant) -> GateDecision {
        let decision = self.decide(estimator, now);
        self.last_tick = Some(now);
        estimator.tick();
        decision
    }

    fn decide(&self, estimator: &FrequencyEstimator, now: Instant) -> GateDecision {
        let elapsed = match self.last_tick {
            Some(previous) => now.saturating_duration_since(previous).as_secs_f64(),
            None => return GateDecision::InsufficientData,
        };
        if elapsed <= 0.0 {
            return GateDecision::InsufficientData;
        }

        let observed_rps = self.tick_size as f64 / elapsed;
        if observed_rps < self.activation_rps as f64 {
            return GateDecision::LoadGateClosed { observed_rps };
        }

        let offenders: Vec<_> = estimator
            .sorted_slice()
            .into_iter()
            .take_while(|e| e.count > self.threshold)
            .collect();

        if offenders.is_empty() {
            GateDecision::NoHeavyHitters { observed_rps }
        } else {
            GateDecision::Block { observed_rps, offenders }
        }
    }
}

/// Estimator and gate evaluator, mutated together under one lock.
pub struct Detector {
    estimator: FrequencyEstimator,
    gate: GateEvaluator,
}

impl Detector {
    /// Detector whose first tick is timed from `started`.
    pub fn new(params: &SketchParams, started: Instant) -> Result<Self, BreakerError> {
        Ok(Self {
            estimator: FrequencyEstimator::new(params)?,
            gate: GateEvaluator::starting_at(params, started),
        })
    }

    /// Count `key`. Returns a decision only when this increment completed a tick.
    pub fn observe(&mut self, key: &str, now: Instant) -> Option<GateDecision> {
        if self.estimator.incr(key) {
            Some(self.gate.evaluate(&mut self.estimator, now))
        } else {
            None
        }
    }

    pub fn estimator(&self) -> &FrequencyEstimator {
        &self.estimator
    }

    pub fn threshold(&self) -> u64 {
        self.gate.threshold()
    }
}
