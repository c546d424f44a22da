//! v1 cross-boundary contracts for the coherence kernel, drivers, and observers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod flags;
pub mod population;
pub mod scoring;
pub mod serde_u64_string;

pub use flags::{FlagImpact, FlagKind, FlagState, SourceModule, ALL_FLAG_KINDS};
pub use population::VariantSnapshot;
pub use scoring::{ScalingContext, ScoreBreakdown, ScoreHistoryEntry, SubMetrics};

pub const SCHEMA_VERSION_V1: &str = "1.0";

/// Construction-time configuration for a coherence engine run.
///
/// Every tunable the control loop reads lives here; there are no hidden
/// constants and no ambient default instance. Out-of-range values are
/// rejected by [`EngineConfig::validate`] at construction, never clamped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub schema_version: String,
    pub run_id: String,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,

    // Oscillator field.
    pub oscillator_count: u16,
    /// Share of oscillators assigned to the stability cohort. Must be
    /// strictly between 0 and 1 so both cohorts are populated.
    pub stability_ratio: f64,
    pub frequency_center: f64,
    pub frequency_spread_stability: f64,
    pub frequency_spread_adaptability: f64,
    pub dt: f64,
    pub cycle_length_ticks: u64,
    pub regime_weight_dominant: f64,
    pub regime_weight_recessive: f64,
    pub coupling_strong: f64,
    pub coupling_weak: f64,
    pub noise_low: f64,
    pub noise_high: f64,
    pub phase_bins: u16,
    /// Interval the timer-driven loop waits between ticks. Also the scale
    /// that converts tick distances into seconds for flag decay.
    pub tick_interval_ms: u64,

    // Score pipeline.
    pub kappa: f64,
    pub eta: f64,
    pub epsilon_lat: f64,
    pub max_error_rate: f64,
    pub omega: f64,
    pub entropy_scale: f64,
    pub epsilon: f64,
    pub feedback_alpha: f64,
    pub feedback_beta: f64,
    pub smoothing_lambda: f64,
    pub normalization_k: f64,
    pub cyclic_correction_enabled: bool,
    pub cyclic_amplitude: f64,
    pub cyclic_period: f64,
    pub cyclic_phase: f64,
    pub history_capacity: usize,

    // Control flags.
    pub flag_decay_mu: f64,
    pub conflict_gamma: f64,
    pub toggle_floor: f64,
    pub toggle_ceiling: f64,

    // Variant population.
    pub max_population: usize,
    pub max_generation: u32,
    pub entropy_threshold: f64,
    pub theta_range: f64,
    pub resonance_global_factor: f64,
    pub resonance_decay_ticks: f64,

    pub notes: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: "run_local_001".to_string(),
            seed: 1337,
            oscillator_count: 40,
            stability_ratio: 0.75,
            frequency_center: 1.0,
            frequency_spread_stability: 0.1,
            frequency_spread_adaptability: 0.5,
            dt: 0.05,
            cycle_length_ticks: 20,
            regime_weight_dominant: 1.2,
            regime_weight_recessive: 0.8,
            coupling_strong: 1.2,
            coupling_weak: 0.6,
            noise_low: 0.05,
            noise_high: 0.2,
            phase_bins: 10,
            tick_interval_ms: 100,
            kappa: 0.05,
            eta: 0.2,
            epsilon_lat: 0.5,
            max_error_rate: 0.5,
            omega: 1.618,
            entropy_scale: 10.0,
            epsilon: 1e-6,
            feedback_alpha: 0.2,
            feedback_beta: 0.1,
            smoothing_lambda: 0.8,
            normalization_k: 1.0,
            cyclic_correction_enabled: false,
            cyclic_amplitude: 0.05,
            cyclic_period: 24.0,
            cyclic_phase: 0.0,
            history_capacity: 100,
            flag_decay_mu: 0.05,
            conflict_gamma: 0.65,
            toggle_floor: 0.5,
            toggle_ceiling: 1.5,
            max_population: 10,
            max_generation: 3,
            entropy_threshold: 0.015,
            theta_range: 0.1,
            resonance_global_factor: 0.75,
            resonance_decay_ticks: 30.0,
            notes: None,
        }
    }
}

impl EngineConfig {
    /// Reject invalid construction parameters. Called by the engine
    /// constructor; a failing config never produces a partially built
    /// engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oscillator_count == 0 {
            return Err(ConfigError::ZeroOscillators);
        }
        if !(self.stability_ratio > 0.0 && self.stability_ratio < 1.0) {
            return Err(ConfigError::StabilityRatioOutOfRange {
                value: self.stability_ratio,
            });
        }
        if self.cycle_length_ticks == 0 {
            return Err(ConfigError::NonPositive {
                field: "cycle_length_ticks",
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::NonPositive {
                field: "tick_interval_ms",
            });
        }
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::NonPositive { field: "dt" });
        }
        if self.phase_bins < 2 {
            return Err(ConfigError::NonPositive {
                field: "phase_bins",
            });
        }
        if !(self.smoothing_lambda >= 0.0 && self.smoothing_lambda < 1.0) {
            return Err(ConfigError::SmoothingLambdaOutOfRange {
                value: self.smoothing_lambda,
            });
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::NonPositive {
                field: "history_capacity",
            });
        }
        if self.max_population == 0 {
            return Err(ConfigError::NonPositive {
                field: "max_population",
            });
        }
        if !(self.entropy_threshold > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "entropy_threshold",
            });
        }
        if !(self.theta_range > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "theta_range",
            });
        }
        if !(self.toggle_floor > 0.0 && self.toggle_floor < self.toggle_ceiling) {
            return Err(ConfigError::ToggleBoundsInverted {
                floor: self.toggle_floor,
                ceiling: self.toggle_ceiling,
            });
        }
        Ok(())
    }

    /// Oscillator count assigned to the stability cohort. Always leaves at
    /// least one oscillator in each cohort.
    pub fn stability_cohort_size(&self) -> usize {
        let count = usize::from(self.oscillator_count);
        if count == 1 {
            return 1;
        }
        let size = (count as f64 * self.stability_ratio).round() as usize;
        size.clamp(1, count - 1)
    }

    /// Tick distance converted to seconds using the configured interval.
    pub fn ticks_to_seconds(&self, ticks: u64) -> f64 {
        ticks as f64 * self.tick_interval_ms as f64 / 1000.0
    }
}

/// Fatal construction errors. Rejected up front, never silently clamped.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    ZeroOscillators,
    StabilityRatioOutOfRange { value: f64 },
    SmoothingLambdaOutOfRange { value: f64 },
    ToggleBoundsInverted { floor: f64, ceiling: f64 },
    NonPositive { field: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroOscillators => write!(f, "oscillator_count must be at least 1"),
            ConfigError::StabilityRatioOutOfRange { value } => {
                write!(f, "stability_ratio must be in (0, 1), got {value}")
            }
            ConfigError::SmoothingLambdaOutOfRange { value } => {
                write!(f, "smoothing_lambda must be in [0, 1), got {value}")
            }
            ConfigError::ToggleBoundsInverted { floor, ceiling } => {
                write!(
                    f,
                    "toggle bounds invalid: floor {floor} must be positive and below ceiling {ceiling}"
                )
            }
            ConfigError::NonPositive { field } => write!(f, "{field} must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// A flag action attempted by a module outside the flag's allow-list.
/// Recoverable: the caller gets the error back and no state changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizationError {
    pub flag: FlagKind,
    pub source_module: SourceModule,
    pub allowed: Vec<SourceModule>,
}

impl fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} is not authorized for {} (allowed: {})",
            self.source_module.as_str(),
            self.flag.as_str(),
            self.allowed
                .iter()
                .map(|module| module.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for AuthorizationError {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Running,
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunStatus {
    pub schema_version: String,
    pub run_id: String,
    pub current_tick: u64,
    pub mode: RunMode,
    pub evaluation_count: u64,
    pub active_flag_count: usize,
    pub population_size: usize,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={} tick={} mode={:?} evaluations={} active_flags={} population={}",
            self.run_id,
            self.current_tick,
            self.mode,
            self.evaluation_count,
            self.active_flag_count,
            self.population_size
        )
    }
}

/// Which cohort currently dominates the regime cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    StabilityDominant,
    AdaptabilityDominant,
}

impl Regime {
    pub fn as_str(self) -> &'static str {
        match self {
            Regime::StabilityDominant => "stability_dominant",
            Regime::AdaptabilityDominant => "adaptability_dominant",
        }
    }
}

/// The authoritative per-tick output of the oscillator field. Replaced
/// wholesale each tick; consumers never see a partially updated state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoherenceState {
    /// Synchrony measurement in [0, 1]; forced to the perturbation target
    /// while a perturbation is active.
    pub value: f64,
    pub cycle_index: u64,
    pub regime: Regime,
    pub cycle_position: f64,
    pub noise_level: f64,
    /// Normalized Shannon entropy of the phase distribution, in [0, 1].
    pub entropy: f64,
}

impl CoherenceState {
    pub fn initial() -> Self {
        Self {
            value: 0.0,
            cycle_index: 0,
            regime: Regime::StabilityDominant,
            cycle_position: 0.0,
            noise_level: 0.0,
            entropy: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    TickCompleted,
    RegimeChanged,
    PerturbationStarted,
    PerturbationEnded,
    FlagActivated,
    FlagDeactivated,
    ScoreEvaluated,
    VariantSpawned,
    VariantEvicted,
}

/// A state-change notification appended to the engine's ordered log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub schema_version: String,
    pub run_id: String,
    pub tick: u64,
    pub created_at: String,
    pub event_id: String,
    pub sequence_in_tick: u64,
    pub event_type: EventType,
    /// Component that produced the event ("oscillators", "pipeline",
    /// "flags", "population").
    pub source: String,
    pub details: Option<Value>,
}
