//! Activation engines
//!
//! Two traversal strategies produce activation maps from anchor neurons:
//! classic spreading activation over synapses, and reflex activation along
//! precomputed fiber pathways. Lateral inhibition and stabilization then
//! shape the raw map before reconstruction.

pub mod inhibition;
pub mod reflex;
pub mod spreading;
pub mod stabilization;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use inhibition::{InhibitionConfig, apply_lateral_inhibition};
pub use reflex::{
    ActivationSnapshot, CoActivation, CoBindingResult, ReflexActivation, ReflexConfig, time_factor,
};
pub use spreading::{ActivatedSubgraph, ActivationConfig, SpreadingActivation};
pub use stabilization::{StabilizationConfig, StabilizationReport, stabilize};

/// Boost applied to the non-maximal share of an intersection neuron's levels
pub const INTERSECTION_BOOST: f32 = 0.5;

/// Activation of a single neuron during one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationResult {
    pub neuron_id: Uuid,
    /// Activation level in [0, 1]
    pub level: f32,
    /// Steps from the source anchor
    pub hop_distance: usize,
    /// Neurons visited from the anchor to this one, both inclusive
    pub path: Vec<Uuid>,
    pub source_anchor: Uuid,
}

impl ActivationResult {
    /// Result for an anchor neuron at full activation
    pub fn anchor(neuron_id: Uuid) -> Self {
        Self {
            neuron_id,
            level: 1.0,
            hop_distance: 0,
            path: vec![neuron_id],
            source_anchor: neuron_id,
        }
    }
}

/// Activation results keyed by neuron id
pub type ActivationMap = HashMap<Uuid, ActivationResult>;

/// Merge per-anchor-set activation maps.
///
/// Neurons reached by at least two sets are intersections, ordered by number
/// of sets (desc) then summed level (desc). An intersection neuron keeps its
/// strongest result with the level boosted to
/// `min(1, max + INTERSECTION_BOOST * (sum - max))`; other neurons keep their
/// strongest result unchanged.
pub fn merge_activation_sets(sets: &[ActivationMap]) -> (ActivationMap, Vec<Uuid>) {
    struct Tally {
        best: ActivationResult,
        sum: f32,
        count: usize,
    }

    let mut tallies: HashMap<Uuid, Tally> = HashMap::new();
    for set in sets {
        for (id, result) in set {
            tallies
                .entry(*id)
                .and_modify(|t| {
                    t.sum += result.level;
                    t.count += 1;
                    if result.level > t.best.level {
                        t.best = result.clone();
                    }
                })
                .or_insert_with(|| Tally {
                    best: result.clone(),
                    sum: result.level,
                    count: 1,
                });
        }
    }

    let mut intersections: Vec<(Uuid, usize, f32)> = tallies
        .iter()
        .filter(|(_, t)| t.count >= 2)
        .map(|(id, t)| (*id, t.count, t.sum))
        .collect();
    intersections.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| b.2.total_cmp(&a.2))
            .then_with(|| a.0.cmp(&b.0))
    });

    let combined = tallies
        .into_iter()
        .map(|(id, t)| {
            let mut result = t.best;
            if t.count >= 2 {
                let max = result.level;
                result.level = (max + INTERSECTION_BOOST * (t.sum - max)).min(1.0);
            }
            (id, result)
        })
        .collect();

    (
        combined,
        intersections.into_iter().map(|(id, _, _)| id).collect(),
    )
}

/// Activation results sorted by level, highest first (ties by id)
pub fn ranked(activations: &ActivationMap) -> Vec<&ActivationResult> {
    let mut ranked: Vec<&ActivationResult> = activations.values().collect();
    ranked.sort_by(|a, b| {
        b.level
            .total_cmp(&a.level)
            .then_with(|| a.neuron_id.cmp(&b.neuron_id))
    });
    ranked
}
