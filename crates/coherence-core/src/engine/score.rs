use contracts::{EventType, ScalingContext, ScoreBreakdown, ScoreHistoryEntry, SubMetrics};
use serde_json::json;

use super::CoherenceEngine;

impl CoherenceEngine {
    /// Run the three-stage pipeline once against the current toggle
    /// multiplier and oscillator entropy. Never fails: out-of-range
    /// inputs are clamped and a non-finite evaluation falls back to the
    /// last known-good breakdown inside the pipeline.
    pub fn evaluate_score(
        &mut self,
        sub_metrics: SubMetrics,
        scaling: &ScalingContext,
    ) -> ScoreBreakdown {
        // Until the field has ticked there is no phase distribution to
        // measure; sub-metric variance stands in for entropy.
        let entropy = if self.has_ticked {
            self.field.state().entropy
        } else {
            sub_metrics.variance_entropy()
        };
        let tick = self.status.current_tick;
        let toggle = self.flags.toggle_multiplier(&self.config, tick);
        let active_flags = self.flags.active_kinds();
        let breakdown = self.pipeline.evaluate(
            &self.config,
            sub_metrics,
            scaling,
            entropy,
            toggle,
            tick,
            active_flags,
        );
        self.last_sub_metrics = sub_metrics.clamped();
        self.status.evaluation_count = self.pipeline.evaluation_count();
        self.push_event(
            EventType::ScoreEvaluated,
            "pipeline",
            Some(json!({
                "raw": breakdown.raw,
                "smoothed": breakdown.smoothed,
                "final": breakdown.final_score,
                "toggle_multiplier": toggle,
                "entropy": entropy,
            })),
        );
        breakdown
    }

    /// Most recent successful breakdown (zeros before any evaluation).
    pub fn last_breakdown(&self) -> ScoreBreakdown {
        self.pipeline.last_breakdown()
    }

    /// Chronological tail of the score history, at most `limit` entries.
    pub fn history(&self, limit: usize) -> Vec<ScoreHistoryEntry> {
        self.pipeline.history(limit)
    }
}
