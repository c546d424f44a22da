//! Variant-population contract types.

use serde::{Deserialize, Serialize};

/// A derived parameter set spawned near the critical balance point.
/// Scored at spawn time and re-weighted by resonance against the rest of
/// the active population.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VariantSnapshot {
    pub variant_id: String,
    /// Two-term balance score in [0, 1].
    pub score: f64,
    pub entropy: f64,
    /// Distance-from-critical parameter, clamped to [0.1, 0.9].
    pub balance_param: f64,
    pub alignment_score: f64,
    pub active_plugins: Vec<String>,
    /// Resonance-derived aggregation weight in [0.25, 1.0].
    pub weight: f64,
    pub parent_id: Option<String>,
    /// Lineage depth; strictly parent + 1, bounded by the configured cap.
    pub generation: u32,
    pub created_tick: u64,
}
