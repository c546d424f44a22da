//! Oscillator cohort field: two weighted phase-oscillator cohorts driven
//! toward synchrony, with a regime cycle that alternates which cohort
//! dominates coupling, weighting, and noise.

use contracts::{CoherenceState, EngineConfig, Regime};

use crate::{mix_seed, sample_range_f64, sample_symmetric, TAU};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cohort {
    Stability,
    Adaptability,
}

#[derive(Debug, Clone)]
pub struct Oscillator {
    /// Current phase, always held in [0, 2π).
    pub phase: f64,
    pub natural_frequency: f64,
    pub cohort: Cohort,
    /// Base multiplicative bias; cohort weights are not normalized to
    /// sum to 1.
    pub weight: f64,
}

/// Per-regime parameter assignment for both cohorts.
#[derive(Debug, Clone, Copy)]
struct RegimeProfile {
    weight_stability: f64,
    weight_adaptability: f64,
    coupling_stability: f64,
    coupling_adaptability: f64,
    noise_stability: f64,
    noise_adaptability: f64,
}

/// A forced synchrony reading. Internal phases keep evolving; only the
/// reported value is overridden while ticks remain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Perturbation {
    pub target_value: f64,
    pub remaining_ticks: u64,
}

/// Outcome of one field tick, carrying the transitions the engine turns
/// into events.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub state: CoherenceState,
    pub regime_changed: bool,
    pub perturbation_released: bool,
}

#[derive(Debug, Clone)]
pub struct OscillatorField {
    oscillators: Vec<Oscillator>,
    cycle_index: u64,
    state: CoherenceState,
    perturbation: Option<Perturbation>,
    seed: u64,
}

const FREQ_STREAM: u64 = 0x05C1;
const PHASE_STREAM: u64 = 0x05C2;
const NOISE_STREAM: u64 = 0x05C3;

impl OscillatorField {
    /// Build the field from a validated config. The caller (the engine
    /// constructor) is responsible for running `config.validate()` first;
    /// the field itself has no failure paths.
    pub fn new(config: &EngineConfig) -> Self {
        let count = usize::from(config.oscillator_count);
        let stability_size = config.stability_cohort_size();
        let mut oscillators = Vec::with_capacity(count);
        for idx in 0..count {
            let cohort = if idx < stability_size {
                Cohort::Stability
            } else {
                Cohort::Adaptability
            };
            let spread = match cohort {
                Cohort::Stability => config.frequency_spread_stability,
                Cohort::Adaptability => config.frequency_spread_adaptability,
            };
            let entity = mix_seed(config.seed, idx as u64 + 1);
            oscillators.push(Oscillator {
                phase: sample_range_f64(entity, PHASE_STREAM, 0.0, TAU),
                natural_frequency: config.frequency_center
                    + sample_symmetric(entity, FREQ_STREAM, spread),
                cohort,
                weight: 1.0,
            });
        }
        Self {
            oscillators,
            cycle_index: 0,
            state: CoherenceState::initial(),
            perturbation: None,
            seed: config.seed,
        }
    }

    pub fn oscillators(&self) -> &[Oscillator] {
        &self.oscillators
    }

    pub fn state(&self) -> &CoherenceState {
        &self.state
    }

    pub fn cycle_index(&self) -> u64 {
        self.cycle_index
    }

    pub fn perturbation(&self) -> Option<Perturbation> {
        self.perturbation
    }

    /// Install a forced synchrony target. Replaces any pending
    /// perturbation wholesale; the previous release schedule is cancelled.
    pub fn perturb(&mut self, target_value: f64, duration_ticks: u64) {
        self.perturbation = Some(Perturbation {
            target_value: target_value.clamp(0.0, 1.0),
            remaining_ticks: duration_ticks,
        });
    }

    /// Drop any pending perturbation. Returns whether one was active.
    pub fn release_perturbation(&mut self) -> bool {
        self.perturbation.take().is_some()
    }

    fn regime_for(&self, config: &EngineConfig, cycle_position: u64) -> Regime {
        let split = config.stability_ratio * config.cycle_length_ticks as f64;
        if (cycle_position as f64) < split {
            Regime::StabilityDominant
        } else {
            Regime::AdaptabilityDominant
        }
    }

    fn profile_for(&self, config: &EngineConfig, regime: Regime) -> RegimeProfile {
        match regime {
            Regime::StabilityDominant => RegimeProfile {
                weight_stability: config.regime_weight_dominant,
                weight_adaptability: config.regime_weight_recessive,
                coupling_stability: config.coupling_strong,
                coupling_adaptability: config.coupling_weak,
                noise_stability: config.noise_low,
                noise_adaptability: config.noise_high,
            },
            Regime::AdaptabilityDominant => RegimeProfile {
                weight_stability: config.regime_weight_recessive,
                weight_adaptability: config.regime_weight_dominant,
                coupling_stability: config.coupling_weak,
                coupling_adaptability: config.coupling_strong,
                noise_stability: config.noise_high,
                noise_adaptability: config.noise_low,
            },
        }
    }

    /// Advance the field one step. Pure internal state advance; no inputs
    /// and no failure paths.
    pub fn tick(&mut self, config: &EngineConfig) -> TickOutcome {
        self.cycle_index = self.cycle_index.saturating_add(1);
        let cycle_position = self.cycle_index % config.cycle_length_ticks;
        let regime = self.regime_for(config, cycle_position);
        let regime_changed = regime != self.state.regime;
        let profile = self.profile_for(config, regime);

        // Weighted circular mean: R is the synchrony measurement, psi the
        // mean phase the coupling term pulls toward.
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut weight_total = 0.0;
        for oscillator in &self.oscillators {
            let regime_weight = match oscillator.cohort {
                Cohort::Stability => profile.weight_stability,
                Cohort::Adaptability => profile.weight_adaptability,
            };
            let weight = oscillator.weight * regime_weight;
            sum_x += weight * oscillator.phase.cos();
            sum_y += weight * oscillator.phase.sin();
            weight_total += weight;
        }
        let synchrony = if weight_total > 0.0 {
            (sum_x * sum_x + sum_y * sum_y).sqrt() / weight_total
        } else {
            0.0
        };
        let mean_phase = sum_y.atan2(sum_x);

        let mut noise_total = 0.0;
        for (idx, oscillator) in self.oscillators.iter_mut().enumerate() {
            let (coupling, noise_amplitude) = match oscillator.cohort {
                Cohort::Stability => (profile.coupling_stability, profile.noise_stability),
                Cohort::Adaptability => {
                    (profile.coupling_adaptability, profile.noise_adaptability)
                }
            };
            let stream = mix_seed(self.cycle_index, idx as u64 + NOISE_STREAM);
            let noise = sample_symmetric(self.seed, stream, noise_amplitude);
            noise_total += noise_amplitude;
            let drift = oscillator.natural_frequency
                + coupling * synchrony * (mean_phase - oscillator.phase).sin()
                + noise;
            oscillator.phase = (oscillator.phase + config.dt * drift).rem_euclid(TAU);
        }
        let noise_level = if self.oscillators.is_empty() {
            0.0
        } else {
            noise_total / self.oscillators.len() as f64
        };

        let entropy = self.phase_entropy(usize::from(config.phase_bins));

        let mut perturbation_released = false;
        let mut reported = synchrony.clamp(0.0, 1.0);
        if let Some(mut perturbation) = self.perturbation.take() {
            if perturbation.remaining_ticks > 0 {
                reported = perturbation.target_value;
                perturbation.remaining_ticks -= 1;
                if perturbation.remaining_ticks == 0 {
                    perturbation_released = true;
                } else {
                    self.perturbation = Some(perturbation);
                }
            }
        }

        self.state = CoherenceState {
            value: reported,
            cycle_index: self.cycle_index,
            regime,
            cycle_position: cycle_position as f64,
            noise_level,
            entropy,
        };
        TickOutcome {
            state: self.state.clone(),
            regime_changed,
            perturbation_released,
        }
    }

    /// Shannon entropy of the phase-bin occupancy distribution, normalized
    /// by log2(bin count) into [0, 1].
    fn phase_entropy(&self, bins: usize) -> f64 {
        if self.oscillators.is_empty() || bins < 2 {
            return 0.0;
        }
        let mut counts = vec![0_usize; bins];
        for oscillator in &self.oscillators {
            let mut bin = (oscillator.phase / TAU * bins as f64) as usize;
            if bin >= bins {
                bin = bins - 1;
            }
            counts[bin] += 1;
        }
        let total = self.oscillators.len() as f64;
        let mut entropy = 0.0;
        for count in counts {
            if count > 0 {
                let p = count as f64 / total;
                entropy -= p * p.log2();
            }
        }
        (entropy / (bins as f64).log2()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> EngineConfig {
        EngineConfig::default()
    }

    #[test]
    fn cohort_split_respects_stability_ratio() {
        let field = OscillatorField::new(&base_config());
        let stability = field
            .oscillators()
            .iter()
            .filter(|oscillator| oscillator.cohort == Cohort::Stability)
            .count();
        assert_eq!(stability, 30);
        assert_eq!(field.oscillators().len(), 40);
    }

    #[test]
    fn phases_stay_wrapped_after_many_ticks() {
        let config = base_config();
        let mut field = OscillatorField::new(&config);
        for _ in 0..500 {
            field.tick(&config);
        }
        for oscillator in field.oscillators() {
            assert!((0.0..TAU).contains(&oscillator.phase));
        }
    }

    #[test]
    fn synchrony_and_entropy_stay_bounded() {
        let config = base_config();
        let mut field = OscillatorField::new(&config);
        for _ in 0..300 {
            let outcome = field.tick(&config);
            assert!((0.0..=1.0).contains(&outcome.state.value));
            assert!((0.0..=1.0).contains(&outcome.state.entropy));
        }
    }

    #[test]
    fn regime_splits_cycle_three_to_one() {
        let config = base_config();
        let mut field = OscillatorField::new(&config);
        let mut stability_ticks = 0;
        let mut adaptability_ticks = 0;
        for _ in 0..config.cycle_length_ticks {
            let outcome = field.tick(&config);
            match outcome.state.regime {
                Regime::StabilityDominant => stability_ticks += 1,
                Regime::AdaptabilityDominant => adaptability_ticks += 1,
            }
        }
        assert_eq!(stability_ticks, 15);
        assert_eq!(adaptability_ticks, 5);
    }

    #[test]
    fn perturbation_overrides_reported_value_then_releases() {
        let config = base_config();
        let mut field = OscillatorField::new(&config);
        field.perturb(0.91, 3);
        for step in 0..3 {
            let outcome = field.tick(&config);
            assert_eq!(outcome.state.value, 0.91);
            let released = outcome.perturbation_released;
            assert_eq!(released, step == 2);
        }
        let outcome = field.tick(&config);
        assert!(field.perturbation().is_none());
        assert_ne!(outcome.state.value, 0.91);
    }

    #[test]
    fn reperturbation_replaces_pending_release() {
        let config = base_config();
        let mut field = OscillatorField::new(&config);
        field.perturb(0.2, 10);
        field.tick(&config);
        field.perturb(0.8, 2);
        let outcome = field.tick(&config);
        assert_eq!(outcome.state.value, 0.8);
        assert_eq!(field.perturbation().map(|p| p.remaining_ticks), Some(1));
    }

    #[test]
    fn equal_seeds_produce_identical_trajectories() {
        let config = base_config();
        let mut left = OscillatorField::new(&config);
        let mut right = OscillatorField::new(&config);
        for _ in 0..64 {
            let a = left.tick(&config);
            let b = right.tick(&config);
            assert_eq!(a.state, b.state);
        }
    }
}
