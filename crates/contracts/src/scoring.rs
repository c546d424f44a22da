//! Score-pipeline contract types: sub-metric inputs, the scaling context,
//! stage outputs, and the bounded history record.

use serde::{Deserialize, Serialize};

use crate::flags::FlagKind;

/// The three independent quality signals consumed by the pipeline.
/// Values outside [0, 1] are clamped at the pipeline boundary rather than
/// rejected so the loop always produces a defined output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SubMetrics {
    pub quality: f64,
    pub efficiency: f64,
    pub consistency: f64,
}

impl SubMetrics {
    pub fn clamped(self) -> Self {
        Self {
            quality: self.quality.clamp(0.0, 1.0),
            efficiency: self.efficiency.clamp(0.0, 1.0),
            consistency: self.consistency.clamp(0.0, 1.0),
        }
    }

    /// Normalized population variance of the three signals, used as an
    /// entropy stand-in before the oscillator field has ticked. Maximum
    /// variance for values in [0, 1] is 2/9 (two signals at one extreme,
    /// one at the other), so the result is already in [0, 1].
    pub fn variance_entropy(self) -> f64 {
        let clamped = self.clamped();
        let mean = (clamped.quality + clamped.efficiency + clamped.consistency) / 3.0;
        let variance = ((clamped.quality - mean).powi(2)
            + (clamped.efficiency - mean).powi(2)
            + (clamped.consistency - mean).powi(2))
            / 3.0;
        (variance / (2.0 / 9.0)).clamp(0.0, 1.0)
    }
}

impl Default for SubMetrics {
    fn default() -> Self {
        Self {
            quality: 0.5,
            efficiency: 0.5,
            consistency: 0.5,
        }
    }
}

/// Deployment-scale inputs to the dimensional density term.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingContext {
    pub module_count: u32,
    pub parallelism: u32,
    pub nesting_depth: u32,
    /// Normalized latency pressure in [0, 1]; clamped at the boundary.
    pub latency: f64,
    /// Normalized error rate in [0, 1]; clamped at the boundary.
    pub error_rate: f64,
}

impl ScalingContext {
    pub fn clamped(&self) -> Self {
        Self {
            module_count: self.module_count,
            parallelism: self.parallelism,
            nesting_depth: self.nesting_depth,
            latency: self.latency.clamp(0.0, 1.0),
            error_rate: self.error_rate.clamp(0.0, 1.0),
        }
    }
}

impl Default for ScalingContext {
    fn default() -> Self {
        Self {
            module_count: 1,
            parallelism: 1,
            nesting_depth: 0,
            latency: 0.0,
            error_rate: 0.0,
        }
    }
}

/// Output of one pipeline evaluation: the raw feedback-damped score, the
/// temporally smoothed score, and the tanh-bounded final score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub raw: f64,
    pub smoothed: f64,
    pub final_score: f64,
}

impl ScoreBreakdown {
    pub fn is_finite(&self) -> bool {
        self.raw.is_finite() && self.smoothed.is_finite() && self.final_score.is_finite()
    }
}

/// Immutable snapshot appended to the score history ring buffer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreHistoryEntry {
    pub tick: u64,
    pub created_at: String,
    pub raw_score: f64,
    pub smoothed_score: f64,
    pub final_score: f64,
    pub sub_metrics: SubMetrics,
    pub active_flags: Vec<FlagKind>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamping_pulls_out_of_range_inputs_back() {
        let metrics = SubMetrics {
            quality: 1.7,
            efficiency: -0.2,
            consistency: 0.4,
        }
        .clamped();
        assert_eq!(metrics.quality, 1.0);
        assert_eq!(metrics.efficiency, 0.0);
        assert_eq!(metrics.consistency, 0.4);
    }

    #[test]
    fn variance_entropy_is_zero_for_equal_signals() {
        let metrics = SubMetrics {
            quality: 0.7,
            efficiency: 0.7,
            consistency: 0.7,
        };
        assert!(metrics.variance_entropy() < 1e-12);
    }

    #[test]
    fn variance_entropy_peaks_for_split_signals() {
        let metrics = SubMetrics {
            quality: 1.0,
            efficiency: 1.0,
            consistency: 0.0,
        };
        assert!((metrics.variance_entropy() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn history_entry_round_trips_through_serde() {
        let entry = ScoreHistoryEntry {
            tick: 42,
            created_at: "1970-01-01T00:00:42Z".to_string(),
            raw_score: 0.61,
            smoothed_score: 0.59,
            final_score: 0.53,
            sub_metrics: SubMetrics::default(),
            active_flags: vec![FlagKind::Failsafe],
        };
        let serialized = serde_json::to_string(&entry).expect("serialize");
        let decoded: ScoreHistoryEntry = serde_json::from_str(&serialized).expect("deserialize");
        assert_eq!(entry, decoded);
    }
}
