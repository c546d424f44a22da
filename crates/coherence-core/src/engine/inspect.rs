use serde_json::{json, Value};

use super::CoherenceEngine;

impl CoherenceEngine {
    /// One JSON summary of everything an external observer may read:
    /// status, coherence state, flags, population, and the score tail.
    pub fn inspect_summary(&self) -> Value {
        let state = self.field.state();
        json!({
            "status": {
                "run_id": self.status.run_id,
                "current_tick": self.status.current_tick,
                "mode": format!("{:?}", self.status.mode).to_lowercase(),
                "evaluations": self.status.evaluation_count,
            },
            "coherence": {
                "value": state.value,
                "entropy": state.entropy,
                "regime": state.regime.as_str(),
                "cycle_index": state.cycle_index,
                "cycle_position": state.cycle_position,
                "noise_level": state.noise_level,
                "perturbed": self.field.perturbation().is_some(),
            },
            "flags": self
                .flags
                .states()
                .iter()
                .map(|flag| {
                    json!({
                        "kind": flag.kind.as_str(),
                        "active": flag.active,
                        "value": flag.value,
                        "activated_tick": flag.activated_tick,
                        "source_module": flag.source_module.map(|module| module.as_str()),
                        "target_module": flag.target_module,
                    })
                })
                .collect::<Vec<_>>(),
            "population": {
                "size": self.population.len(),
                "aggregate_score": self.population.aggregate_score(),
                "variants": self
                    .population
                    .variants()
                    .iter()
                    .map(|variant| {
                        json!({
                            "variant_id": variant.variant_id,
                            "score": variant.score,
                            "weight": variant.weight,
                            "generation": variant.generation,
                            "balance_param": variant.balance_param,
                            "parent_id": variant.parent_id,
                        })
                    })
                    .collect::<Vec<_>>(),
            },
            "score_tail": self
                .history(5)
                .iter()
                .map(|entry| {
                    json!({
                        "tick": entry.tick,
                        "raw": entry.raw_score,
                        "smoothed": entry.smoothed_score,
                        "final": entry.final_score,
                    })
                })
                .collect::<Vec<_>>(),
            "replay_hash": format!("{:016x}", self.replay_hash),
        })
    }
}
