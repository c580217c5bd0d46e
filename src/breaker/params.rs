//! Sketch parameters and the sensitivity presets.
//!
//! A sensitivity level is a named bundle that trades memory for accuracy and
//! aggressiveness. Parameters are immutable once the breaker is built.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::breaker::BreakerError;

/// Named sensitivity level selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SensitivityLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl SensitivityLevel {
    /// All levels, in ascending order of aggressiveness.
    pub const ALL: [SensitivityLevel; 3] = [Self::Low, Self::Medium, Self::High];

    /// The preset parameters for this level.
    pub const fn params(self) -> SketchParams {
        match self {
            Self::Low => SketchParams {
                k: 2,
                window_size: 5,
                tick_size: 100,
                width: 256,
                depth: 2,
                activation_rps: 100,
                max_share_percent: 50,
            },
            Self::Medium => SketchParams {
                k: 3,
                window_size: 10,
                tick_size: 100,
                width: 1024,
                depth: 3,
                activation_rps: 500,
                max_share_percent: 35,
            },
            Self::High => SketchParams {
                k: 5,
                window_size: 10,
                tick_size: 200,
                width: 4096,
                depth: 4,
                activation_rps: 1000,
                max_share_percent: 20,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of the heavy-hitter sketch and the gate policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SketchParams {
    /// Number of heavy hitters tracked.
    pub k: usize,
    /// Number of ticks in the sliding window.
    pub window_size: usize,
    /// Requests per tick.
    pub tick_size: u64,
    /// Counters per hash row.
    pub width: usize,
    /// Number of hash rows.
    pub depth: usize,
    /// Minimum observed requests per second before blocking is considered.
    pub activation_rps: u64,
    /// Share of the window a single key may hold before it is blocked.
    pub max_share_percent: u64,
}

impl SketchParams {
    /// Total requests covered by a full window.
    pub fn window_capacity(&self) -> u64 {
        (self.window_size as u64).saturating_mul(self.tick_size)
    }

    /// Count a key must exceed within the window to be blocked.
    ///
    /// Floor division is kept on purpose: at small capacities it rounds the
    /// threshold down, which makes the `low` preset slightly stricter.
    pub fn threshold_count(&self) -> u64 {
        self.window_capacity().saturating_mul(self.max_share_percent) / 100
    }

    /// Reject parameter sets the sketch cannot be built from.
    pub fn validate(&self) -> Result<(), BreakerError> {
        if self.width == 0 {
            return Err(BreakerError::InvalidParams("width must be positive".into()));
        }
        if self.depth == 0 {
            return Err(BreakerError::InvalidParams("depth must be positive".into()));
        }
        if self.window_size == 0 {
            return Err(BreakerError::InvalidParams("window size must be at least 1".into()));
        }
        if self.tick_size == 0 {
            return Err(BreakerError::InvalidParams("tick size must be positive".into()));
        }
        if self.k == 0 {
            return Err(BreakerError::InvalidParams("k must be positive".into()));
        }
        if self.max_share_percent > 100 {
            return Err(BreakerError::InvalidParams(format!(
                "max share percent {} exceeds 100",
                self.max_share_percent
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_are_valid() {
        for level in SensitivityLevel::ALL {
            assert!(level.params().validate().is_ok(), "{level} preset invalid");
        }
    }

    #[test]
    fn test_threshold_uses_floor_division() {
        let low = SensitivityLevel::Low.params();
        assert_eq!(low.window_capacity(), 500);
        assert_eq!(low.threshold_count(), 250);

        let medium = SensitivityLevel::Medium.params();
        assert_eq!(medium.window_capacity(), 1000);
        assert_eq!(medium.threshold_count(), 350);

        let high = SensitivityLevel::High.params();
        assert_eq!(high.window_capacity(), 2000);
        assert_eq!(high.threshold_count(), 400);

        let tiny = SketchParams { window_size: 1, tick_size: 3, max_share_percent: 50, ..low };
        assert_eq!(tiny.threshold_count(), 1);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let base = SensitivityLevel::Low.params();
        assert!(SketchParams { width: 0, ..base }.validate().is_err());
        assert!(SketchParams { depth: 0, ..base }.validate().is_err());
        assert!(SketchParams { window_size: 0, ..base }.validate().is_err());
        assert!(SketchParams { tick_size: 0, ..base }.validate().is_err());
        assert!(SketchParams { max_share_percent: 101, ..base }.validate().is_err());
    }

    #[test]
    fn test_level_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            level: SensitivityLevel,
        }
        let w: Wrapper = toml::from_str("level = \"high\"").unwrap();
        assert_eq!(w.level, SensitivityLevel::High);
    }
}
