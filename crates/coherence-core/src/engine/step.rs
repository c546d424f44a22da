use contracts::{CoherenceState, EventType, RunMode};
use serde_json::json;

use super::CoherenceEngine;

impl CoherenceEngine {
    /// Mark the loop running. Idempotent; the timer that actually drives
    /// ticks lives with the caller.
    pub fn start(&mut self) {
        self.status.mode = RunMode::Running;
    }

    /// Halt the loop and cancel any pending perturbation release so no
    /// stale override survives a shutdown.
    pub fn stop(&mut self) {
        self.status.mode = RunMode::Paused;
        if self.field.release_perturbation() {
            self.push_event(
                EventType::PerturbationEnded,
                "oscillators",
                Some(json!({ "reason": "engine_stopped" })),
            );
        }
    }

    pub fn is_running(&self) -> bool {
        self.status.mode == RunMode::Running
    }

    /// Advance the oscillator field one step. Callable both by the timer
    /// loop and directly while paused.
    pub fn tick(&mut self) -> CoherenceState {
        self.status.current_tick = self.status.current_tick.saturating_add(1);
        let outcome = self.field.tick(&self.config);
        if outcome.perturbation_released {
            self.push_event(
                EventType::PerturbationEnded,
                "oscillators",
                Some(json!({ "reason": "duration_elapsed" })),
            );
        }
        if outcome.regime_changed {
            self.push_event(
                EventType::RegimeChanged,
                "oscillators",
                Some(json!({
                    "regime": outcome.state.regime.as_str(),
                    "cycle_index": outcome.state.cycle_index,
                })),
            );
        }
        self.has_ticked = true;
        self.push_event(
            EventType::TickCompleted,
            "oscillators",
            Some(json!({
                "value": outcome.state.value,
                "entropy": outcome.state.entropy,
                "regime": outcome.state.regime.as_str(),
            })),
        );
        outcome.state
    }

    /// Advance up to `n` ticks, returning how many were committed.
    pub fn step_n(&mut self, n: u64) -> u64 {
        for _ in 0..n {
            self.tick();
        }
        n
    }

    /// Advance until the engine clock reaches `tick`. Returns the number
    /// of committed steps.
    pub fn run_to_tick(&mut self, tick: u64) -> u64 {
        let mut committed = 0_u64;
        while self.status.current_tick < tick {
            self.tick();
            committed += 1;
        }
        committed
    }

    /// Force the reported synchrony value for the next `duration_ticks`
    /// ticks. A second call replaces the pending perturbation wholesale,
    /// cancelling its scheduled release.
    pub fn perturb(&mut self, target_value: f64, duration_ticks: u64) {
        let replaced = self.field.perturbation().is_some();
        self.field.perturb(target_value, duration_ticks);
        self.push_event(
            EventType::PerturbationStarted,
            "oscillators",
            Some(json!({
                "target_value": target_value.clamp(0.0, 1.0),
                "duration_ticks": duration_ticks,
                "replaced_pending": replaced,
            })),
        );
    }

    /// Manually release an active perturbation. Returns whether one was
    /// pending.
    pub fn release_perturbation(&mut self) -> bool {
        if self.field.release_perturbation() {
            self.push_event(
                EventType::PerturbationEnded,
                "oscillators",
                Some(json!({ "reason": "released" })),
            );
            true
        } else {
            false
        }
    }
}
