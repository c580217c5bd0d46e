//! Adaptive traffic-share circuit breaker.
//!
//! # Data Flow
//! ```text
//! Request (client key)
//!     → registry.rs   (blocked in current bucket? → 429)
//!     → controller.rs (forward, then process)
//!         → sketch.rs (incr in current tick)
//!         → gate.rs   (on tick completion: load gate, share gate, slide)
//!         → worker.rs (offenders queued, blocks written off the request path)
//!             → registry.rs → cache.rs
//! ```
//!
//! # Design Decisions
//! - One coarse lock around sketch + gate; the critical section is O(depth)
//! - Rejected requests never reach the sketch
//! - Block writes are fire-and-forget; a failed write is logged and dropped
//! - State is per process; instances do not coordinate

pub mod cache;
pub mod clock;
pub mod controller;
pub mod gate;
pub mod params;
pub mod registry;
pub mod sketch;
pub mod worker;

pub use cache::{BlockCache, BlockEntry, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{BreakerStatus, Controller, Verdict};
pub use gate::{Detector, GateDecision, GateEvaluator};
pub use params::{SensitivityLevel, SketchParams};
pub use registry::{BlockReceipt, BlockRegistry};
pub use sketch::{FrequencyEstimator, HeavyHitterEntry};
pub use worker::{BlockQueue, BlockWorker};

use thiserror::Error;

/// Errors raised by the breaker.
#[derive(Debug, Error)]
pub enum BreakerError {
    /// Sketch parameters that cannot produce a working estimator.
    #[error("Invalid sketch parameters: {0}")]
    InvalidParams(String),

    /// The block cache refused a write.
    #[error("Block cache refused write for {client} in bucket {bucket}")]
    CacheWrite { client: String, bucket: u64 },
}
