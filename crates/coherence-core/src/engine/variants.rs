use contracts::{EventType, VariantSnapshot};
use serde_json::json;

use super::CoherenceEngine;

impl CoherenceEngine {
    /// Attempt to spawn a variant near the critical balance point, using
    /// the most recently evaluated sub-metrics for its score. Returns
    /// `None` when the gates or the probability draw say no.
    pub fn spawn_variant(
        &mut self,
        balance_param: f64,
        entropy: f64,
        parent_id: Option<&str>,
    ) -> Option<VariantSnapshot> {
        let tick = self.status.current_tick;
        let sub_metrics = self.last_sub_metrics;
        let outcome = self.population.spawn(
            &self.config,
            balance_param,
            entropy,
            parent_id,
            &sub_metrics,
            tick,
        )?;
        self.status.population_size = self.population.len();
        if let Some(evicted) = &outcome.evicted {
            self.push_event(
                EventType::VariantEvicted,
                "population",
                Some(json!({
                    "variant_id": evicted.variant_id,
                    "weight": evicted.weight,
                    "reason": "population_cap",
                })),
            );
        }
        self.push_event(
            EventType::VariantSpawned,
            "population",
            Some(json!({
                "variant_id": outcome.variant.variant_id,
                "parent_id": outcome.variant.parent_id,
                "generation": outcome.variant.generation,
                "balance_param": outcome.variant.balance_param,
                "score": outcome.variant.score,
                "plugins": outcome.variant.active_plugins,
            })),
        );
        Some(outcome.variant)
    }

    pub fn variants(&self) -> &[VariantSnapshot] {
        self.population.variants()
    }

    pub fn variant(&self, variant_id: &str) -> Option<&VariantSnapshot> {
        self.population.get(variant_id)
    }

    /// Weight-weighted mean score of the active population.
    pub fn population_aggregate_score(&self) -> f64 {
        self.population.aggregate_score()
    }
}
