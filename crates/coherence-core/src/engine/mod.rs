use std::collections::BTreeMap;

mod control;
mod events;
mod inspect;
mod score;
mod step;
mod variants;

use contracts::{
    CoherenceState, ConfigError, EngineConfig, Event, RunMode, RunStatus, SubMetrics,
    SCHEMA_VERSION_V1,
};

use crate::flags::FlagBoard;
use crate::oscillator::OscillatorField;
use crate::pipeline::ScorePipeline;
use crate::population::VariantPool;

/// The assembled control loop: oscillator field, score pipeline, flag
/// board, and variant pool behind one explicitly constructed object.
///
/// All state is owned by this single struct; callers drive it with plain
/// method calls and observe it through the event log or a subscription
/// cursor. There is no ambient default instance.
#[derive(Debug)]
pub struct CoherenceEngine {
    config: EngineConfig,
    status: RunStatus,
    field: OscillatorField,
    pipeline: ScorePipeline,
    flags: FlagBoard,
    population: VariantPool,
    event_log: Vec<Event>,
    /// Read cursor per subscription, indexing into `event_log`.
    subscriptions: BTreeMap<u64, usize>,
    next_subscription_id: u64,
    /// Most recent (clamped) sub-metrics, reused when spawning variants.
    last_sub_metrics: SubMetrics,
    has_ticked: bool,
    last_event_tick: u64,
    sequence_in_tick: u64,
    state_hash: u64,
    replay_hash: u64,
}

impl CoherenceEngine {
    /// Validate the config and assemble the engine. Invalid parameters
    /// are rejected here, never clamped into a runnable state.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let status = RunStatus {
            schema_version: SCHEMA_VERSION_V1.to_string(),
            run_id: config.run_id.clone(),
            current_tick: 0,
            mode: RunMode::Paused,
            evaluation_count: 0,
            active_flag_count: 0,
            population_size: 0,
        };
        let field = OscillatorField::new(&config);
        let population = VariantPool::new(config.seed);
        Ok(Self {
            config,
            status,
            field,
            pipeline: ScorePipeline::new(),
            flags: FlagBoard::new(),
            population,
            event_log: Vec::new(),
            subscriptions: BTreeMap::new(),
            next_subscription_id: 0,
            last_sub_metrics: SubMetrics::default(),
            has_ticked: false,
            last_event_tick: 0,
            sequence_in_tick: 0,
            state_hash: 0,
            replay_hash: 0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn run_id(&self) -> &str {
        &self.status.run_id
    }

    /// Current authoritative coherence state (initial zeros before the
    /// first tick).
    pub fn coherence_state(&self) -> &CoherenceState {
        self.field.state()
    }
}

#[cfg(test)]
mod tests;
