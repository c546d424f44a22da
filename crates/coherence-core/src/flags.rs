//! Control-flag board: four always-present flags with allow-list
//! authorization, audit-preserving deactivation, and the decayed,
//! conflict-resolved toggle multiplier fed into the score pipeline.

use contracts::{
    AuthorizationError, EngineConfig, FlagImpact, FlagKind, FlagState, SourceModule,
    ALL_FLAG_KINDS,
};

/// Result of a successful flag action; the engine turns this into an
/// event.
#[derive(Debug, Clone)]
pub struct FlagActionOutcome {
    pub state: FlagState,
    pub impact: FlagImpact,
    pub reason: String,
    /// False when a deactivation hit an already-inactive flag; audit
    /// fields were left untouched.
    pub changed: bool,
}

#[derive(Debug, Clone)]
pub struct FlagBoard {
    flags: [FlagState; 4],
}

fn slot(kind: FlagKind) -> usize {
    match kind {
        FlagKind::Stop => 0,
        FlagKind::Failsafe => 1,
        FlagKind::Reroute => 2,
        FlagKind::Wormhole => 3,
    }
}

impl FlagBoard {
    pub fn new() -> Self {
        Self {
            flags: [
                FlagState::inactive(FlagKind::Stop),
                FlagState::inactive(FlagKind::Failsafe),
                FlagState::inactive(FlagKind::Reroute),
                FlagState::inactive(FlagKind::Wormhole),
            ],
        }
    }

    pub fn state(&self, kind: FlagKind) -> &FlagState {
        &self.flags[slot(kind)]
    }

    pub fn states(&self) -> &[FlagState] {
        &self.flags
    }

    pub fn active_kinds(&self) -> Vec<FlagKind> {
        ALL_FLAG_KINDS
            .into_iter()
            .filter(|kind| self.flags[slot(*kind)].active)
            .collect()
    }

    pub fn active_count(&self) -> usize {
        self.flags.iter().filter(|flag| flag.active).count()
    }

    fn authorize(kind: FlagKind, source: SourceModule) -> Result<(), AuthorizationError> {
        if kind.authorizes(source) {
            Ok(())
        } else {
            Err(AuthorizationError {
                flag: kind,
                source_module: source,
                allowed: kind.allowed_sources().to_vec(),
            })
        }
    }

    /// Activate a flag. Fails the authorization gate without mutating
    /// anything; on success the flag's value comes from its pure
    /// activation rule at the (clamped) balance parameter.
    pub fn activate(
        &mut self,
        kind: FlagKind,
        source: SourceModule,
        reason: &str,
        balance_param: f64,
        target_module: Option<String>,
        tick: u64,
    ) -> Result<FlagActionOutcome, AuthorizationError> {
        Self::authorize(kind, source)?;
        let balance = balance_param.clamp(0.0, 1.0);
        let flag = &mut self.flags[slot(kind)];
        flag.active = true;
        flag.value = kind.activation_value(balance);
        flag.activated_tick = Some(tick);
        flag.source_module = Some(source);
        flag.target_module = if kind.takes_target() {
            target_module
        } else {
            None
        };
        Ok(FlagActionOutcome {
            state: flag.clone(),
            impact: FlagImpact::classify(balance),
            reason: reason.to_string(),
            changed: true,
        })
    }

    /// Deactivate a flag. Same authorization gate as activation. The
    /// audit trail (`activated_tick`, `source_module`) survives; an
    /// already-inactive flag is left untouched.
    pub fn deactivate(
        &mut self,
        kind: FlagKind,
        source: SourceModule,
        reason: &str,
        balance_param: f64,
    ) -> Result<FlagActionOutcome, AuthorizationError> {
        Self::authorize(kind, source)?;
        let balance = balance_param.clamp(0.0, 1.0);
        let flag = &mut self.flags[slot(kind)];
        let changed = flag.active;
        flag.active = false;
        flag.value = 1.0;
        Ok(FlagActionOutcome {
            state: flag.clone(),
            impact: FlagImpact::classify(balance),
            reason: format!("Deactivated: {reason}"),
            changed,
        })
    }

    /// Decayed value of one flag at the given tick: the activation value
    /// relaxes exponentially toward 1.0.
    fn decayed_value(&self, config: &EngineConfig, flag: &FlagState, current_tick: u64) -> f64 {
        let elapsed_ticks = flag
            .activated_tick
            .map(|activated| current_tick.saturating_sub(activated))
            .unwrap_or(0);
        let seconds = config.ticks_to_seconds(elapsed_ticks);
        1.0 + (flag.value - 1.0) * (-config.flag_decay_mu * seconds).exp()
    }

    /// Combined multiplicative contribution of all active flags.
    ///
    /// One active flag contributes its decayed value raised to its
    /// weight. Concurrent flags are conflict-resolved: the spread between
    /// the strongest and weakest decayed values shrinks the effective
    /// value before the weighted product. Always clamped into the
    /// configured band.
    pub fn toggle_multiplier(&self, config: &EngineConfig, current_tick: u64) -> f64 {
        let active: Vec<&FlagState> = self.flags.iter().filter(|flag| flag.active).collect();
        if active.is_empty() {
            return 1.0;
        }
        let decayed: Vec<f64> = active
            .iter()
            .map(|flag| self.decayed_value(config, flag, current_tick))
            .collect();
        let multiplier = if decayed.len() == 1 {
            decayed[0].powf(active[0].weight)
        } else {
            let max = decayed.iter().cloned().fold(f64::MIN, f64::max);
            let min = decayed.iter().cloned().fold(f64::MAX, f64::min);
            let effective = max * (1.0 - config.conflict_gamma * (max - min));
            active
                .iter()
                .map(|flag| effective.powf(flag.weight))
                .product()
        };
        multiplier.clamp(config.toggle_floor, config.toggle_ceiling)
    }
}

impl Default for FlagBoard {
    fn default() -> Self {
        Self::new()
    }
}
