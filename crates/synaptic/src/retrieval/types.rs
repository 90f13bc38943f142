//! Result types for the retrieval pipeline

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activation::{ActivationResult, CoActivation};

/// Coarse exploration budget for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthLevel {
    /// Direct facts, one hop
    Instant,
    /// Surrounding context and sequences
    Context,
    /// Recurring patterns
    Habit,
    /// Causes and feelings, full hop budget
    Deep,
}

impl DepthLevel {
    /// Hop budget for this depth; `Deep` uses the configured maximum
    pub fn max_hops(&self, deep_max_hops: usize) -> usize {
        match self {
            DepthLevel::Instant => 1,
            DepthLevel::Context => 3,
            DepthLevel::Habit => 4,
            DepthLevel::Deep => deep_max_hops.max(1),
        }
    }
}

/// How the answer was assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMethod {
    /// Nothing relevant was found
    None,
    /// One dominant neuron's content
    Single,
    /// A matched fiber's precomputed summary
    FiberSummary,
    /// Several neurons' content joined together
    MultiNeuron,
}

/// Additive components of the answer confidence.
///
/// `raw_total` is the sum before clamping; confidence is `raw_total`
/// clamped to [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub base_activation: f32,
    pub intersection_boost: f32,
    pub freshness_boost: f32,
    pub frequency_boost: f32,
    pub emotional_resonance: f32,
    pub raw_total: f32,
}

impl ScoreBreakdown {
    pub fn new(
        base_activation: f32,
        intersection_boost: f32,
        freshness_boost: f32,
        frequency_boost: f32,
        emotional_resonance: f32,
    ) -> Self {
        Self {
            base_activation,
            intersection_boost,
            freshness_boost,
            frequency_boost,
            emotional_resonance,
            raw_total: base_activation
                + intersection_boost
                + freshness_boost
                + frequency_boost
                + emotional_resonance,
        }
    }

    pub fn confidence(&self) -> f32 {
        if self.raw_total.is_nan() {
            0.0
        } else {
            self.raw_total.clamp(0.0, 1.0)
        }
    }
}

/// Ids touched by a retrieval
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalSubgraph {
    pub neuron_ids: Vec<Uuid>,
    pub synapse_ids: Vec<Uuid>,
    pub anchor_ids: Vec<Uuid>,
}

/// Everything a query produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub answer: Option<String>,
    pub confidence: f32,
    pub depth_used: DepthLevel,
    pub neurons_activated: usize,
    pub fibers_matched: Vec<Uuid>,
    pub subgraph: RetrievalSubgraph,
    /// Formatted memory context for a downstream model
    pub context: String,
    pub latency_ms: f64,
    pub co_activations: Vec<CoActivation>,
    pub score_breakdown: ScoreBreakdown,
    pub contributing_neuron_ids: Vec<Uuid>,
    pub synthesis_method: SynthesisMethod,
    /// Strongest activations, highest first
    pub activations: Vec<ActivationResult>,
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RetrievalResult {
    /// Successful result for a query that matched nothing
    pub fn empty(depth_used: DepthLevel, context: String) -> Self {
        Self {
            answer: None,
            confidence: 0.0,
            depth_used,
            neurons_activated: 0,
            fibers_matched: Vec::new(),
            subgraph: RetrievalSubgraph::default(),
            context,
            latency_ms: 0.0,
            co_activations: Vec::new(),
            score_breakdown: ScoreBreakdown::default(),
            contributing_neuron_ids: Vec::new(),
            synthesis_method: SynthesisMethod::None,
            activations: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}
