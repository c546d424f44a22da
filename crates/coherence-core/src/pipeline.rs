//! Composite score pipeline: raw nonlinear score with feedback damping,
//! temporal smoothing, and tanh normalization, with a bounded history
//! ring and a last-known-good fallback so an evaluation never fails
//! across a tick boundary.

use std::collections::VecDeque;

use contracts::{
    EngineConfig, FlagKind, ScalingContext, ScoreBreakdown, ScoreHistoryEntry, SubMetrics,
};

use crate::synthetic_timestamp;

#[derive(Debug, Clone)]
pub struct ScorePipeline {
    previous_raw: Option<f64>,
    /// Last two raw-score deltas, for the linear extrapolation in the
    /// feedback term.
    last_delta: f64,
    prev_delta: f64,
    eval_index: u64,
    history: VecDeque<ScoreHistoryEntry>,
    last_good: ScoreBreakdown,
}

impl ScorePipeline {
    pub fn new() -> Self {
        Self {
            previous_raw: None,
            last_delta: 0.0,
            prev_delta: 0.0,
            eval_index: 0,
            history: VecDeque::new(),
            last_good: ScoreBreakdown {
                raw: 0.0,
                smoothed: 0.0,
                final_score: 0.0,
            },
        }
    }

    pub fn evaluation_count(&self) -> u64 {
        self.eval_index
    }

    pub fn last_breakdown(&self) -> ScoreBreakdown {
        self.last_good
    }

    /// Chronological tail of the history ring, at most `limit` entries.
    pub fn history(&self, limit: usize) -> Vec<ScoreHistoryEntry> {
        let skip = self.history.len().saturating_sub(limit);
        self.history.iter().skip(skip).cloned().collect()
    }

    /// Stage 1 dimensional density D in [1, 2]: log-scaled module and
    /// parallelism counts, depth-amplified, latency-discounted, with the
    /// error rate shrinking kappa toward zero.
    fn density(&self, config: &EngineConfig, scaling: &ScalingContext) -> f64 {
        let error_ratio = if config.max_error_rate > config.epsilon {
            (scaling.error_rate / config.max_error_rate).min(1.0)
        } else {
            1.0
        };
        let kappa = config.kappa * (1.0 - error_ratio);
        let delta = kappa
            * (f64::from(scaling.module_count) + 1.0).ln()
            * (f64::from(scaling.parallelism) + 1.0).ln()
            * (1.0 + config.eta * f64::from(scaling.nesting_depth));
        (1.0 + delta * (1.0 - config.epsilon_lat * scaling.latency)).clamp(1.0, 2.0)
    }

    /// Run the three stages once. Out-of-range metric inputs are clamped,
    /// never rejected; a non-finite result falls back to the last
    /// known-good breakdown without mutating pipeline state.
    pub fn evaluate(
        &mut self,
        config: &EngineConfig,
        sub_metrics: SubMetrics,
        scaling: &ScalingContext,
        entropy: f64,
        toggle_multiplier: f64,
        tick: u64,
        active_flags: Vec<FlagKind>,
    ) -> ScoreBreakdown {
        let metrics = sub_metrics.clamped();
        let scaling = scaling.clamped();
        let entropy = entropy.clamp(0.0, 1.0);

        // Stage 1: raw score with feedback damping.
        let density = self.density(config, &scaling);
        let ordered = metrics.quality * metrics.efficiency * metrics.consistency * density;
        let disorder = (config.entropy_scale * entropy + config.epsilon).sqrt();
        let raw_base = ordered.powf(config.omega) * toggle_multiplier / disorder;

        let previous_raw = self.previous_raw.unwrap_or(raw_base);
        let predicted_delta = 2.0 * self.last_delta - self.prev_delta;
        let feedback = (1.0
            - config.feedback_alpha * (raw_base - previous_raw).abs()
            - config.feedback_beta * predicted_delta.abs())
        .clamp(0.5, 1.0);
        let raw = raw_base * feedback;

        // Stage 2: temporal smoothing, optionally modulated by the damped
        // cyclic correction.
        let lambda = config.smoothing_lambda;
        let mut smoothed = lambda * previous_raw + (1.0 - lambda) * raw;
        if config.cyclic_correction_enabled && config.cyclic_period > 0.0 {
            let t = self.eval_index as f64;
            smoothed *= 1.0
                + config.cyclic_amplitude
                    * (-0.05 * t).exp()
                    * (crate::TAU * t / config.cyclic_period + config.cyclic_phase).cos();
        }

        // Stage 3: bounded normalization.
        let final_score = (config.normalization_k * smoothed).tanh();

        let breakdown = ScoreBreakdown {
            raw,
            smoothed,
            final_score,
        };
        if !breakdown.is_finite() {
            return self.last_good;
        }

        self.prev_delta = self.last_delta;
        self.last_delta = raw - previous_raw;
        self.previous_raw = Some(raw);
        self.eval_index = self.eval_index.saturating_add(1);
        self.last_good = breakdown;

        self.history.push_back(ScoreHistoryEntry {
            tick,
            created_at: synthetic_timestamp(tick, self.eval_index),
            raw_score: raw,
            smoothed_score: smoothed,
            final_score,
            sub_metrics: metrics,
            active_flags,
        });
        while self.history.len() > config.history_capacity {
            let _ = self.history.pop_front();
        }

        breakdown
    }
}

impl Default for ScorePipeline {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn mid_metrics() -> SubMetrics {
        SubMetrics {
            quality: 0.8,
            efficiency: 0.7,
            consistency: 0.75,
        }
    }

    #[test]
    fn density_stays_in_unit_band() {
        let pipeline = ScorePipeline::new();
        let scaling = ScalingContext {
            module_count: 64,
            parallelism: 16,
            nesting_depth: 8,
            latency: 0.0,
            error_rate: 0.0,
        };
        let density = pipeline.density(&config(), &scaling);
        assert!((1.0..=2.0).contains(&density));
    }

    #[test]
    fn saturated_error_rate_collapses_density_to_floor() {
        let pipeline = ScorePipeline::new();
        let scaling = ScalingContext {
            module_count: 64,
            parallelism: 16,
            nesting_depth: 8,
            latency: 0.0,
            error_rate: 1.0,
        };
        assert_eq!(pipeline.density(&config(), &scaling), 1.0);
    }

    #[test]
    fn constant_inputs_converge_smoothed_to_raw() {
        let config = config();
        let mut pipeline = ScorePipeline::new();
        let scaling = ScalingContext::default();
        let mut last = None;
        for tick in 0..50 {
            last = Some(pipeline.evaluate(
                &config,
                mid_metrics(),
                &scaling,
                0.1,
                1.0,
                tick,
                Vec::new(),
            ));
        }
        let last = last.expect("evaluated");
        assert!((last.smoothed - last.raw).abs() < 1e-9);
    }

    #[test]
    fn final_score_is_tanh_bounded() {
        let config = config();
        let mut pipeline = ScorePipeline::new();
        let scaling = ScalingContext {
            module_count: 10_000,
            parallelism: 10_000,
            nesting_depth: 100,
            latency: 0.0,
            error_rate: 0.0,
        };
        for tick in 0..20 {
            let breakdown = pipeline.evaluate(
                &config,
                SubMetrics {
                    quality: 1.0,
                    efficiency: 1.0,
                    consistency: 1.0,
                },
                &scaling,
                0.0,
                1.5,
                tick,
                Vec::new(),
            );
            assert!(breakdown.final_score.abs() < 1.0);
        }
    }

    #[test]
    fn history_ring_is_bounded() {
        let mut config = config();
        config.history_capacity = 5;
        let mut pipeline = ScorePipeline::new();
        let scaling = ScalingContext::default();
        for tick in 0..32 {
            pipeline.evaluate(
                &config,
                mid_metrics(),
                &scaling,
                0.2,
                1.0,
                tick,
                Vec::new(),
            );
        }
        let history = pipeline.history(100);
        assert_eq!(history.len(), 5);
        assert_eq!(history.last().map(|entry| entry.tick), Some(31));
    }

    #[test]
    fn out_of_range_inputs_are_clamped_not_rejected() {
        let config = config();
        let mut pipeline = ScorePipeline::new();
        let breakdown = pipeline.evaluate(
            &config,
            SubMetrics {
                quality: 2.5,
                efficiency: -1.0,
                consistency: 0.5,
            },
            &ScalingContext {
                module_count: 3,
                parallelism: 2,
                nesting_depth: 1,
                latency: 9.0,
                error_rate: -4.0,
            },
            3.0,
            1.0,
            0,
            Vec::new(),
        );
        assert!(breakdown.is_finite());
        // efficiency clamps to 0 so the whole ordered product vanishes.
        assert_eq!(breakdown.raw, 0.0);
    }
}
