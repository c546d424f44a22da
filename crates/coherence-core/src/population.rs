//! Variant population manager: gated probabilistic spawning with lineage
//! and plugin mutation, pairwise resonance, mean-resonance re-weighting,
//! and the weighted population aggregate score.
//!
//! The population is capped. On overflow the lowest-weight variant is
//! evicted (ties broken by oldest creation tick, then id order) — the
//! one policy decision the scoring model leaves open, made explicit here.

use contracts::{EngineConfig, SubMetrics, VariantSnapshot};

use crate::{hash_bytes, mix_seed, sample_symmetric, sample_unit};

/// Fixed plugin catalog variants mutate over. The first entry is
/// critical: mutation never removes it.
pub const PLUGIN_CATALOG: [&str; 6] = [
    "attractor_lock",
    "noise_damper",
    "entropy_probe",
    "phase_mirror",
    "drift_compass",
    "echo_filter",
];

pub const CRITICAL_PLUGINS: [&str; 1] = ["attractor_lock"];

const GATE_STREAM: u64 = 0x0A01;
const BALANCE_STREAM: u64 = 0x0A02;
const MUTATION_STREAM: u64 = 0x0A03;
const MUTATION_PICK_STREAM: u64 = 0x0A04;
const MUTATION_DIRECTION_STREAM: u64 = 0x0A05;

/// Successful spawn plus the variant that had to make room, if any.
#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub variant: VariantSnapshot,
    pub evicted: Option<VariantSnapshot>,
}

#[derive(Debug, Clone)]
pub struct VariantPool {
    variants: Vec<VariantSnapshot>,
    spawn_counter: u64,
    seed: u64,
}

impl VariantPool {
    pub fn new(seed: u64) -> Self {
        Self {
            variants: Vec::new(),
            spawn_counter: 0,
            seed,
        }
    }

    pub fn variants(&self) -> &[VariantSnapshot] {
        &self.variants
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn get(&self, variant_id: &str) -> Option<&VariantSnapshot> {
        self.variants
            .iter()
            .find(|variant| variant.variant_id == variant_id)
    }

    /// Attempt a spawn near the critical balance point. Returns `None`
    /// when a gate fails or the probability draw misses; gating rules and
    /// the probability curve both come from the entropy input.
    pub fn spawn(
        &mut self,
        config: &EngineConfig,
        balance_param: f64,
        entropy: f64,
        parent_id: Option<&str>,
        sub_metrics: &SubMetrics,
        tick: u64,
    ) -> Option<SpawnOutcome> {
        let balance = balance_param.clamp(0.0, 1.0);
        let entropy = entropy.clamp(0.0, 1.0);
        let parent = parent_id.and_then(|id| self.get(id)).cloned();
        let base_generation = parent.as_ref().map(|p| p.generation).unwrap_or(0);

        let near_critical = (balance - 0.5).abs() < config.theta_range;
        let entropy_spike = entropy > 2.0 * config.entropy_threshold;
        if !(near_critical || entropy_spike)
            || entropy <= config.entropy_threshold
            || base_generation >= config.max_generation
        {
            return None;
        }

        let lineage_salt = parent
            .as_ref()
            .map(|p| hash_bytes(p.variant_id.as_bytes()))
            .unwrap_or(0);
        let draw_seed = mix_seed(
            self.seed ^ lineage_salt,
            self.spawn_counter.wrapping_add(1),
        );
        self.spawn_counter = self.spawn_counter.saturating_add(1);

        let probability = ((1.0 - (-entropy / config.entropy_threshold).exp())
            * (1.0 + 2.0 * (entropy - 0.02).max(0.0)))
        .min(1.0);
        if sample_unit(draw_seed, GATE_STREAM) >= probability {
            return None;
        }

        // Spike far from critical pulls the new balance 40% toward the
        // midpoint; otherwise it wanders within the theta band.
        let new_balance = if entropy_spike && !near_critical {
            balance + 0.4 * (0.5 - balance)
        } else {
            balance + sample_symmetric(draw_seed, BALANCE_STREAM, config.theta_range)
        }
        .clamp(0.1, 0.9);

        let parent_alignment = parent.as_ref().map(|p| p.alignment_score).unwrap_or(0.5);
        let alignment_score = (parent_alignment
            + 0.05 * (1.0 - ((new_balance - 0.5).abs() / 0.4).min(1.0)))
        .min(0.999);

        let mut active_plugins: Vec<String> = parent
            .as_ref()
            .map(|p| p.active_plugins.clone())
            .unwrap_or_else(|| {
                CRITICAL_PLUGINS
                    .iter()
                    .map(|plugin| plugin.to_string())
                    .collect()
            });
        self.mutate_plugins(&mut active_plugins, entropy, draw_seed);

        let generation = if parent.is_some() {
            base_generation + 1
        } else {
            0
        };
        let variant = VariantSnapshot {
            variant_id: format!("var_{:04}", self.spawn_counter),
            score: Self::variant_score(config, sub_metrics, new_balance, entropy),
            entropy,
            balance_param: new_balance,
            alignment_score,
            active_plugins,
            weight: 1.0,
            parent_id: parent.as_ref().map(|p| p.variant_id.clone()),
            generation,
            created_tick: tick,
        };

        let evicted = if self.variants.len() >= config.max_population {
            self.evict_weakest()
        } else {
            None
        };
        self.variants.push(variant.clone());
        self.reweight(config);
        Some(SpawnOutcome { variant, evicted })
    }

    /// Minimal two-term score: an order term shrunk by disorder and a
    /// disorder term amplified by how far the signals sit from saturation,
    /// blended by the balance parameter.
    fn variant_score(
        config: &EngineConfig,
        sub_metrics: &SubMetrics,
        balance: f64,
        entropy: f64,
    ) -> f64 {
        let metrics = sub_metrics.clamped();
        let product = metrics.quality * metrics.efficiency * metrics.consistency;
        let order = product / (10.0 * entropy + config.epsilon).sqrt();
        let residual = ((1.0 - metrics.quality)
            * (1.0 - metrics.efficiency)
            * (1.0 - metrics.consistency))
            .max(config.epsilon);
        let disorder = (entropy + config.epsilon).sqrt() / residual;
        ((1.0 - balance) * order + balance * disorder).clamp(0.0, 1.0)
    }

    fn mutate_plugins(&self, plugins: &mut Vec<String>, entropy: f64, draw_seed: u64) {
        let mutation_probability = (0.15 * entropy * 10.0).min(1.0);
        if sample_unit(draw_seed, MUTATION_STREAM) >= mutation_probability {
            return;
        }
        let additions: Vec<&str> = PLUGIN_CATALOG
            .iter()
            .copied()
            .filter(|candidate| !plugins.iter().any(|plugin| plugin == candidate))
            .collect();
        let removable: Vec<usize> = plugins
            .iter()
            .enumerate()
            .filter(|(_, plugin)| !CRITICAL_PLUGINS.contains(&plugin.as_str()))
            .map(|(idx, _)| idx)
            .collect();
        let add = if additions.is_empty() {
            false
        } else if removable.is_empty() {
            true
        } else {
            sample_unit(draw_seed, MUTATION_DIRECTION_STREAM) < 0.5
        };
        if add {
            let pick = (mix_seed(draw_seed, MUTATION_PICK_STREAM) % additions.len() as u64) as usize;
            plugins.push(additions[pick].to_string());
        } else if !removable.is_empty() {
            let pick = (mix_seed(draw_seed, MUTATION_PICK_STREAM) % removable.len() as u64) as usize;
            plugins.remove(removable[pick]);
        }
    }

    /// Pairwise resonance between two variants: similarity across score,
    /// entropy, and alignment, damped by creation-age distance and
    /// amplified by the first variant's entropy excess.
    pub fn resonance(
        config: &EngineConfig,
        left: &VariantSnapshot,
        right: &VariantSnapshot,
    ) -> f64 {
        let similarity = 0.5 * (1.0 - (left.score - right.score).abs())
            + 0.3 * (1.0 - (left.entropy - right.entropy).abs())
            + 0.2 * (1.0 - (left.alignment_score - right.alignment_score).abs());
        let age_gap = left.created_tick.abs_diff(right.created_tick) as f64;
        let decay = if config.resonance_decay_ticks > 0.0 {
            (-age_gap / config.resonance_decay_ticks).exp()
        } else {
            1.0
        };
        config.resonance_global_factor
            * similarity
            * decay
            * (1.0 + 2.0 * (left.entropy - 0.02).max(0.0))
    }

    /// Re-derive every variant's weight from its mean resonance against
    /// the rest of the pool, mapped into [0.25, 1.0]. A lone variant
    /// holds full weight.
    pub fn reweight(&mut self, config: &EngineConfig) {
        if self.variants.len() < 2 {
            if let Some(only) = self.variants.first_mut() {
                only.weight = 1.0;
            }
            return;
        }
        let snapshot = self.variants.clone();
        for variant in &mut self.variants {
            let mut total = 0.0;
            let mut count = 0;
            for other in &snapshot {
                if other.variant_id == variant.variant_id {
                    continue;
                }
                total += Self::resonance(config, variant, other);
                count += 1;
            }
            let mean = total / count as f64;
            variant.weight = 0.25 + 0.75 * mean.clamp(0.0, 1.0);
        }
    }

    /// Weight-weighted mean of variant scores; 0.0 for an empty pool.
    pub fn aggregate_score(&self) -> f64 {
        let weight_total: f64 = self.variants.iter().map(|variant| variant.weight).sum();
        if weight_total <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = self
            .variants
            .iter()
            .map(|variant| variant.weight * variant.score)
            .sum();
        weighted / weight_total
    }

    /// Remove and return the lowest-weight variant. Ties go to the oldest
    /// creation tick, then lexicographic id, keeping eviction
    /// deterministic.
    fn evict_weakest(&mut self) -> Option<VariantSnapshot> {
        let idx = self
            .variants
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.weight
                    .partial_cmp(&b.weight)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.created_tick.cmp(&b.created_tick))
                    .then(a.variant_id.cmp(&b.variant_id))
            })
            .map(|(idx, _)| idx)?;
        Some(self.variants.remove(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn metrics() -> SubMetrics {
        SubMetrics {
            quality: 0.8,
            efficiency: 0.75,
            consistency: 0.7,
        }
    }

    fn spawn_until(
        pool: &mut VariantPool,
        config: &EngineConfig,
        balance: f64,
        entropy: f64,
        attempts: usize,
    ) -> Option<SpawnOutcome> {
        for tick in 0..attempts {
            if let Some(outcome) =
                pool.spawn(config, balance, entropy, None, &metrics(), tick as u64)
            {
                return Some(outcome);
            }
        }
        None
    }

    #[test]
    fn entropy_below_threshold_never_spawns() {
        let config = config();
        let mut pool = VariantPool::new(1337);
        for balance in [0.1, 0.3, 0.5, 0.7, 0.9] {
            for tick in 0..200 {
                assert!(pool
                    .spawn(&config, balance, 0.01, None, &metrics(), tick)
                    .is_none());
            }
        }
    }

    #[test]
    fn near_critical_with_hot_entropy_spawns_eventually() {
        let config = config();
        let mut pool = VariantPool::new(1337);
        let outcome = spawn_until(&mut pool, &config, 0.5, 0.2, 100).expect("spawn succeeds");
        let variant = outcome.variant;
        assert!((0.1..=0.9).contains(&variant.balance_param));
        assert!((0.0..=1.0).contains(&variant.score));
        assert_eq!(variant.generation, 0);
        assert!(variant
            .active_plugins
            .iter()
            .any(|plugin| plugin == "attractor_lock"));
    }

    #[test]
    fn far_from_critical_without_spike_never_spawns() {
        let config = config();
        let mut pool = VariantPool::new(1337);
        // Entropy above the base threshold but below the spike threshold,
        // balance outside the theta band: both gates fail.
        for tick in 0..200 {
            assert!(pool
                .spawn(&config, 0.9, 0.02, None, &metrics(), tick)
                .is_none());
        }
    }

    #[test]
    fn spike_far_from_critical_pulls_balance_toward_midpoint() {
        let config = config();
        let mut pool = VariantPool::new(7);
        let outcome = spawn_until(&mut pool, &config, 0.9, 0.3, 200).expect("spawn succeeds");
        let expected = 0.9 + 0.4 * (0.5 - 0.9);
        assert!((outcome.variant.balance_param - expected).abs() < 1e-12);
    }

    #[test]
    fn lineage_increments_generation_and_respects_cap() {
        let config = config();
        let mut pool = VariantPool::new(42);
        let root = spawn_until(&mut pool, &config, 0.5, 0.25, 200)
            .expect("root spawn")
            .variant;
        let mut parent_id = root.variant_id.clone();
        let mut last_generation = root.generation;
        for round in 0..20 {
            let spawned = (0..200).find_map(|attempt| {
                pool.spawn(
                    &config,
                    0.5,
                    0.25,
                    Some(parent_id.as_str()),
                    &metrics(),
                    1000 + round * 200 + attempt,
                )
            });
            match spawned {
                Some(outcome) => {
                    assert_eq!(outcome.variant.generation, last_generation + 1);
                    last_generation = outcome.variant.generation;
                    parent_id = outcome.variant.variant_id.clone();
                }
                None => break,
            }
        }
        assert!(pool
            .variants()
            .iter()
            .all(|variant| variant.generation <= config.max_generation));
    }

    #[test]
    fn population_stays_capped_and_evicts_lowest_weight() {
        let mut config = config();
        config.max_population = 3;
        let mut pool = VariantPool::new(9);
        let mut spawned = 0;
        let mut evictions = 0;
        let mut tick = 0;
        while spawned < 6 && tick < 5000 {
            if let Some(outcome) = pool.spawn(&config, 0.5, 0.3, None, &metrics(), tick) {
                spawned += 1;
                if outcome.evicted.is_some() {
                    evictions += 1;
                }
            }
            tick += 1;
        }
        assert!(spawned >= 4, "expected repeated spawns, got {spawned}");
        assert!(pool.len() <= 3);
        assert!(evictions >= 1, "overflow spawns must evict");
    }

    #[test]
    fn weights_land_in_band_and_aggregate_is_bounded() {
        let config = config();
        let mut pool = VariantPool::new(21);
        let mut tick = 0;
        while pool.len() < 4 && tick < 5000 {
            pool.spawn(&config, 0.5, 0.28, None, &metrics(), tick);
            tick += 1;
        }
        assert!(pool.len() >= 2, "population did not grow");
        for variant in pool.variants() {
            assert!((0.25..=1.0).contains(&variant.weight));
        }
        let aggregate = pool.aggregate_score();
        assert!((0.0..=1.0).contains(&aggregate));
    }

    #[test]
    fn resonance_of_identical_twins_matches_closed_form() {
        let config = config();
        let variant = VariantSnapshot {
            variant_id: "var_0001".to_string(),
            score: 0.6,
            entropy: 0.1,
            balance_param: 0.5,
            alignment_score: 0.55,
            active_plugins: vec!["attractor_lock".to_string()],
            weight: 1.0,
            parent_id: None,
            generation: 0,
            created_tick: 10,
        };
        let twin = VariantSnapshot {
            variant_id: "var_0002".to_string(),
            created_tick: 10,
            ..variant.clone()
        };
        let resonance = VariantPool::resonance(&config, &variant, &twin);
        let expected = config.resonance_global_factor * (1.0 + 2.0 * (0.1 - 0.02));
        assert!((resonance - expected).abs() < 1e-12);
    }
}
