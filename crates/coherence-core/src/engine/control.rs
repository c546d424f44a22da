use contracts::{AuthorizationError, Event, EventType, FlagKind, FlagState, SourceModule};
use serde_json::json;

use super::CoherenceEngine;

impl CoherenceEngine {
    /// Activate a control flag on behalf of `source`. The authorization
    /// gate rejects unlisted modules without mutating any flag state;
    /// the returned event carries the impact classification.
    pub fn activate_flag(
        &mut self,
        kind: FlagKind,
        source: SourceModule,
        reason: &str,
        balance_param: f64,
        target_module: Option<String>,
    ) -> Result<Event, AuthorizationError> {
        let tick = self.status.current_tick;
        let outcome = self.flags.activate(
            kind,
            source,
            reason,
            balance_param,
            target_module,
            tick,
        )?;
        self.status.active_flag_count = self.flags.active_count();
        let event = self.push_event(
            EventType::FlagActivated,
            "flags",
            Some(json!({
                "flag": kind.as_str(),
                "source_module": source.as_str(),
                "reason": outcome.reason,
                "impact": outcome.impact,
                "value": outcome.state.value,
                "target_module": outcome.state.target_module,
            })),
        );
        Ok(event)
    }

    /// Deactivate a control flag. Same gate as activation; audit fields
    /// survive and deactivating an inactive flag changes nothing.
    pub fn deactivate_flag(
        &mut self,
        kind: FlagKind,
        source: SourceModule,
        reason: &str,
        balance_param: f64,
    ) -> Result<Event, AuthorizationError> {
        let outcome = self
            .flags
            .deactivate(kind, source, reason, balance_param)?;
        self.status.active_flag_count = self.flags.active_count();
        let event = self.push_event(
            EventType::FlagDeactivated,
            "flags",
            Some(json!({
                "flag": kind.as_str(),
                "source_module": source.as_str(),
                "reason": outcome.reason,
                "impact": outcome.impact,
                "changed": outcome.changed,
            })),
        );
        Ok(event)
    }

    pub fn flag(&self, kind: FlagKind) -> &FlagState {
        self.flags.state(kind)
    }

    pub fn flags(&self) -> &[FlagState] {
        self.flags.states()
    }

    /// Combined multiplicative flag contribution at the current tick.
    pub fn toggle_multiplier(&self) -> f64 {
        self.flags
            .toggle_multiplier(&self.config, self.status.current_tick)
    }
}
