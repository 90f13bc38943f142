//! Answer reconstruction from an activation map
//!
//! Picks the neurons that best explain the activation pattern and turns them
//! into an answer: one dominant fact, a matched fiber's summary, or several
//! facts joined in pathway order. Confidence is the clamped sum of the
//! `ScoreBreakdown` components.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::activation::{ActivationMap, ranked};
use crate::error::Result;
use crate::graph::{Fiber, Neuron, NeuronType};
use crate::retrieval::types::{ScoreBreakdown, SynthesisMethod};
use crate::storage::GraphStore;

/// Score multiplier for neurons reached from several anchor sets
pub const INTERSECTION_SCORE_MULTIPLIER: f32 = 1.5;

/// The top candidate wins outright when it scores at least this many times
/// the runner-up
pub const DOMINANCE_RATIO: f32 = 2.0;

/// Separator between facts in a multi-neuron answer
pub const MULTI_NEURON_SEPARATOR: &str = "; ";

const FRESHNESS_WEIGHT: f32 = 0.1;
const FRESHNESS_HORIZON_HOURS: f32 = 168.0;
const FREQUENCY_WEIGHT: f32 = 0.05;
const FREQUENCY_SATURATION: f32 = 10.0;
const EMOTION_WEIGHT: f32 = 0.1;

/// Metadata key holding a neuron's emotional valence in [-1, 1]
pub const VALENCE_KEY: &str = "valence";

/// A reconstructed answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reconstruction {
    pub answer: Option<String>,
    pub confidence: f32,
    pub method: SynthesisMethod,
    pub contributing_neuron_ids: Vec<Uuid>,
    pub score_breakdown: ScoreBreakdown,
}

impl Reconstruction {
    fn none() -> Self {
        Self {
            answer: None,
            confidence: 0.0,
            method: SynthesisMethod::None,
            contributing_neuron_ids: Vec::new(),
            score_breakdown: ScoreBreakdown::default(),
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    neuron: Neuron,
    level: f32,
    score: f32,
}

/// Reconstruct an answer from activations.
///
/// `fibers` should be the matched fibers, most salient first. Time neurons
/// and neurons that vanished from the store never contribute.
pub async fn reconstruct_answer(
    store: &dyn GraphStore,
    activations: &ActivationMap,
    intersection_ids: &[Uuid],
    fibers: &[Fiber],
    max_contributing: usize,
    reference_time: DateTime<Utc>,
) -> Result<Reconstruction> {
    let candidates = load_candidates(store, activations, intersection_ids).await?;
    let Some(top) = candidates.first() else {
        debug!("No candidates to reconstruct from");
        return Ok(Reconstruction::none());
    };

    let dominant = candidates
        .get(1)
        .is_none_or(|runner_up| top.score >= DOMINANCE_RATIO * runner_up.score);

    let (method, answer, contributors) = if dominant {
        (
            SynthesisMethod::Single,
            top.neuron.content.clone(),
            vec![top.clone()],
        )
    } else if let Some((fiber, summary)) = summary_fiber(fibers, &candidates) {
        let members: Vec<Candidate> = candidates
            .iter()
            .filter(|c| fiber.contains(c.neuron.id))
            .take(max_contributing.max(1))
            .cloned()
            .collect();
        (SynthesisMethod::FiberSummary, summary, members)
    } else {
        let mut selected: Vec<Candidate> = candidates
            .iter()
            .take(max_contributing.max(1))
            .cloned()
            .collect();
        order_by_pathway(&mut selected, fibers);
        let answer = selected
            .iter()
            .map(|c| c.neuron.content.as_str())
            .collect::<Vec<_>>()
            .join(MULTI_NEURON_SEPARATOR);
        (SynthesisMethod::MultiNeuron, answer, selected)
    };

    let score_breakdown = score(store, &contributors, reference_time).await?;
    let confidence = score_breakdown.confidence();

    debug!(
        method = ?method,
        contributors = contributors.len(),
        confidence,
        "Answer reconstructed"
    );

    Ok(Reconstruction {
        answer: Some(answer),
        confidence,
        method,
        contributing_neuron_ids: contributors.iter().map(|c| c.neuron.id).collect(),
        score_breakdown,
    })
}

/// Scored candidates, best first. Ties break on id for determinism.
async fn load_candidates(
    store: &dyn GraphStore,
    activations: &ActivationMap,
    intersection_ids: &[Uuid],
) -> Result<Vec<Candidate>> {
    let ids: Vec<Uuid> = ranked(activations).iter().map(|r| r.neuron_id).collect();
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let intersections: HashSet<Uuid> = intersection_ids.iter().copied().collect();

    let mut candidates: Vec<Candidate> = store
        .get_neurons_batch(&ids)
        .await?
        .into_iter()
        .filter(|n| n.neuron_type != NeuronType::Time)
        .filter_map(|neuron| {
            let level = activations.get(&neuron.id)?.level;
            let score = if intersections.contains(&neuron.id) {
                level * INTERSECTION_SCORE_MULTIPLIER
            } else {
                level
            };
            Some(Candidate {
                neuron,
                level,
                score,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.neuron.id.cmp(&b.neuron.id))
    });
    Ok(candidates)
}

/// First fiber with a non-empty summary that contains a candidate
fn summary_fiber<'f>(fibers: &'f [Fiber], candidates: &[Candidate]) -> Option<(&'f Fiber, String)> {
    fibers.iter().find_map(|fiber| {
        let summary = fiber.summary.as_deref()?.trim();
        if summary.is_empty() || !candidates.iter().any(|c| fiber.contains(c.neuron.id)) {
            return None;
        }
        Some((fiber, summary.to_string()))
    })
}

/// Sort by position in the first pathway holding at least two of the
/// selected neurons. Neurons off that pathway follow, by score.
fn order_by_pathway(selected: &mut [Candidate], fibers: &[Fiber]) {
    let Some(fiber) = fibers.iter().find(|f| {
        selected
            .iter()
            .filter(|c| f.pathway_position(c.neuron.id).is_some())
            .count()
            >= 2
    }) else {
        return;
    };

    selected.sort_by(|a, b| {
        let pa = fiber.pathway_position(a.neuron.id);
        let pb = fiber.pathway_position(b.neuron.id);
        match (pa, pb) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => b.score.total_cmp(&a.score),
        }
    });
}

async fn score(
    store: &dyn GraphStore,
    contributors: &[Candidate],
    reference_time: DateTime<Utc>,
) -> Result<ScoreBreakdown> {
    if contributors.is_empty() {
        return Ok(ScoreBreakdown::default());
    }
    let count = contributors.len() as f32;

    let base_activation = contributors.iter().map(|c| c.level).sum::<f32>() / count;
    let intersection_boost =
        contributors.iter().map(|c| c.score - c.level).sum::<f32>() / count;

    let mut freshest = 0.0_f32;
    let mut frequency_sum = 0.0_f32;
    let mut resonance = 0.0_f32;
    for candidate in contributors {
        let state = store.get_neuron_state(candidate.neuron.id).await?;

        let last_seen = state
            .as_ref()
            .and_then(|s| s.last_activated)
            .map_or(candidate.neuron.created_at, |at| at.max(candidate.neuron.created_at));
        let age_hours = (reference_time - last_seen).num_seconds().max(0) as f32 / 3600.0;
        freshest = freshest.max((1.0 - age_hours / FRESHNESS_HORIZON_HOURS).max(0.0));

        if let Some(state) = &state {
            frequency_sum += (state.access_frequency as f32 / FREQUENCY_SATURATION).min(1.0);
        }

        if let Some(valence) = candidate.neuron.metadata_f32(VALENCE_KEY) {
            resonance = resonance.max(valence.clamp(-1.0, 1.0).abs());
        }
    }

    Ok(ScoreBreakdown::new(
        base_activation,
        intersection_boost,
        FRESHNESS_WEIGHT * freshest,
        FREQUENCY_WEIGHT * frequency_sum / count,
        EMOTION_WEIGHT * resonance,
    ))
}
