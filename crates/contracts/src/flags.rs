//! Control-flag contract types: the closed flag and module unions, the
//! per-kind activation-value rules, and the audited flag state record.

use serde::{Deserialize, Serialize};

/// Modules that may request flag actions. Closed set; authorization is a
/// membership test against each flag's allow-list.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceModule {
    Oracle,
    Sanctum,
    Halo,
    Nova,
}

impl SourceModule {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceModule::Oracle => "oracle",
            SourceModule::Sanctum => "sanctum",
            SourceModule::Halo => "halo",
            SourceModule::Nova => "nova",
        }
    }
}

/// The four control flags. Each carries its own activation-value rule as
/// a pure function of the balance parameter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    Stop,
    Failsafe,
    Reroute,
    Wormhole,
}

pub const ALL_FLAG_KINDS: [FlagKind; 4] = [
    FlagKind::Stop,
    FlagKind::Failsafe,
    FlagKind::Reroute,
    FlagKind::Wormhole,
];

impl FlagKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FlagKind::Stop => "stop",
            FlagKind::Failsafe => "failsafe",
            FlagKind::Reroute => "reroute",
            FlagKind::Wormhole => "wormhole",
        }
    }

    /// Modules allowed to activate or deactivate this flag.
    pub fn allowed_sources(self) -> &'static [SourceModule] {
        match self {
            FlagKind::Stop => &[SourceModule::Oracle, SourceModule::Sanctum],
            FlagKind::Failsafe => &[
                SourceModule::Oracle,
                SourceModule::Sanctum,
                SourceModule::Halo,
            ],
            FlagKind::Reroute => &[SourceModule::Oracle, SourceModule::Halo, SourceModule::Nova],
            FlagKind::Wormhole => &[SourceModule::Oracle, SourceModule::Halo],
        }
    }

    pub fn authorizes(self, source: SourceModule) -> bool {
        self.allowed_sources().contains(&source)
    }

    /// Whether the flag carries a routing target when activated.
    pub fn takes_target(self) -> bool {
        matches!(self, FlagKind::Reroute)
    }

    /// Activation value for this flag at the given balance parameter.
    /// The input is clamped to [0, 1]; the result always lands in
    /// [0.8, 1.2].
    pub fn activation_value(self, balance_param: f64) -> f64 {
        let b = balance_param.clamp(0.0, 1.0);
        let drift = (b - 0.5).abs();
        match self {
            FlagKind::Stop => 0.85,
            FlagKind::Failsafe => (1.0 - drift).max(0.8),
            FlagKind::Reroute => 1.0 + 0.1 * (1.0 - 2.0 * drift),
            FlagKind::Wormhole => {
                if (0.45..=0.55).contains(&b) {
                    1.2
                } else {
                    1.1
                }
            }
        }
    }
}

/// Impact classification attached to activation events, derived from the
/// balance parameter's distance to the critical midpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlagImpact {
    High,
    Medium,
    Low,
}

impl FlagImpact {
    pub fn classify(balance_param: f64) -> Self {
        let drift = (balance_param.clamp(0.0, 1.0) - 0.5).abs();
        if drift < 0.1 {
            FlagImpact::High
        } else if drift < 0.25 {
            FlagImpact::Medium
        } else {
            FlagImpact::Low
        }
    }
}

/// Current state of one control flag. All four records always exist;
/// `activated_tick` and `source_module` survive deactivation for audit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlagState {
    pub kind: FlagKind,
    pub active: bool,
    /// Multiplier contribution in [0.8, 1.2]; 1.0 while inactive.
    pub value: f64,
    pub activated_tick: Option<u64>,
    pub source_module: Option<SourceModule>,
    /// Routing destination, reroute only.
    pub target_module: Option<String>,
    /// Exponent applied to this flag's decayed value in the combined
    /// toggle multiplier, in [0, 1].
    pub weight: f64,
}

impl FlagState {
    pub fn inactive(kind: FlagKind) -> Self {
        Self {
            kind,
            active: false,
            value: 1.0,
            activated_tick: None,
            source_module: None,
            target_module: None,
            weight: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_value_is_fixed() {
        assert_eq!(FlagKind::Stop.activation_value(0.5), 0.85);
        assert_eq!(FlagKind::Stop.activation_value(0.0), 0.85);
    }

    #[test]
    fn failsafe_value_floors_at_low_balance() {
        assert!((FlagKind::Failsafe.activation_value(0.5) - 1.0).abs() < 1e-12);
        assert!((FlagKind::Failsafe.activation_value(0.0) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn wormhole_steps_at_critical_band() {
        assert!((FlagKind::Wormhole.activation_value(0.5) - 1.2).abs() < 1e-12);
        assert!((FlagKind::Wormhole.activation_value(0.3) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn activation_values_stay_in_band() {
        for kind in ALL_FLAG_KINDS {
            for step in 0..=20 {
                let value = kind.activation_value(step as f64 / 20.0);
                assert!((0.8..=1.2).contains(&value), "{kind:?} produced {value}");
            }
        }
    }

    #[test]
    fn impact_classification_bands() {
        assert_eq!(FlagImpact::classify(0.5), FlagImpact::High);
        assert_eq!(FlagImpact::classify(0.62), FlagImpact::Medium);
        assert_eq!(FlagImpact::classify(0.9), FlagImpact::Low);
    }

    #[test]
    fn nova_cannot_touch_stop() {
        assert!(!FlagKind::Stop.authorizes(SourceModule::Nova));
        assert!(FlagKind::Reroute.authorizes(SourceModule::Nova));
    }
}
