//! Reflex retrieval pipeline
//!
//! One query runs through strictly ordered stages:
//!
//! 1. PARSE: the external `QueryParser` turns text into a `Stimulus`
//! 2. DETECT_DEPTH: intent and wording pick a hop budget
//! 3. ANCHOR: time, entity and keyword cues resolve to anchor neuron sets
//! 4. ACTIVATE: classic spreading, reflex trails, or both
//! 5. INHIBIT / STABILIZE: optional shaping of the raw activation map
//! 6. MATCH_FIBERS: fibers holding the strongest neurons
//! 7. RECONSTRUCT: answer, confidence and score breakdown
//! 8. FORMAT: context block for a downstream model
//!
//! The graph is read-only from the pipeline's point of view. Storage errors
//! propagate unchanged; a query that matches nothing is a successful empty
//! result.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::activation::{
    ActivationMap, CoActivation, ReflexActivation, SpreadingActivation, apply_lateral_inhibition,
    ranked, stabilize,
};
use crate::config::Config;
use crate::error::Result;
use crate::graph::{Fiber, NeuronType};
use crate::parser::{QueryParser, Stimulus};
use crate::retrieval::context::{format_context, no_match_context};
use crate::retrieval::depth::detect_depth;
use crate::retrieval::reconstruction::reconstruct_answer;
use crate::retrieval::types::{DepthLevel, RetrievalResult, RetrievalSubgraph};
use crate::storage::{FiberQuery, GraphStore, NeuronQuery};

/// Which activation engine drives a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationStrategy {
    /// Spreading activation over synapses only
    Classic,
    /// Fiber trail activation only
    Reflex,
    /// Reflex first, classic at half depth to discover what reflex missed
    Hybrid,
}

/// Configuration for the retrieval pipeline
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Activation engine (default: hybrid)
    #[serde(default = "default_strategy")]
    pub strategy: ActivationStrategy,
    /// Apply lateral inhibition after activation (default: true)
    #[serde(default = "default_enabled")]
    pub enable_inhibition: bool,
    /// Apply stabilization after activation (default: true)
    #[serde(default = "default_enabled")]
    pub enable_stabilization: bool,
    /// Upper bound on neurons merged into one answer (default: 5)
    #[serde(default = "default_max_contributing")]
    pub max_contributing: usize,
    /// Token budget for the formatted context (default: 500)
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    /// Multiplier for neurons only classic discovery reached in hybrid mode (default: 0.5)
    #[serde(default = "default_hybrid_discovery_dampening")]
    pub hybrid_discovery_dampening: f32,
    /// Time neurons taken per time hint (default: 5)
    #[serde(default = "default_max_anchors_per_time_hint")]
    pub max_anchors_per_time_hint: usize,
    /// Neurons taken per entity mention (default: 3)
    #[serde(default = "default_max_anchors_per_entity")]
    pub max_anchors_per_entity: usize,
    /// Total entity anchors (default: 10)
    #[serde(default = "default_max_set_anchors")]
    pub max_entity_anchors: usize,
    /// Keywords considered, most important first (default: 5)
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    /// Neurons taken per keyword (default: 2)
    #[serde(default = "default_max_anchors_per_keyword")]
    pub max_anchors_per_keyword: usize,
    /// Total keyword anchors (default: 10)
    #[serde(default = "default_max_set_anchors")]
    pub max_keyword_anchors: usize,
    /// Strongest neurons used to look up fibers (default: 20)
    #[serde(default = "default_fiber_match_neurons")]
    pub fiber_match_neurons: usize,
    /// Matched fibers kept (default: 10)
    #[serde(default = "default_max_fibers")]
    pub max_fibers: usize,
    /// Activations reported in the result (default: 20)
    #[serde(default = "default_max_reported_activations")]
    pub max_reported_activations: usize,
    /// Neurons included in the result subgraph (default: 50)
    #[serde(default = "default_max_subgraph_neurons")]
    pub max_subgraph_neurons: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            enable_inhibition: default_enabled(),
            enable_stabilization: default_enabled(),
            max_contributing: default_max_contributing(),
            max_context_tokens: default_max_context_tokens(),
            hybrid_discovery_dampening: default_hybrid_discovery_dampening(),
            max_anchors_per_time_hint: default_max_anchors_per_time_hint(),
            max_anchors_per_entity: default_max_anchors_per_entity(),
            max_entity_anchors: default_max_set_anchors(),
            max_keywords: default_max_keywords(),
            max_anchors_per_keyword: default_max_anchors_per_keyword(),
            max_keyword_anchors: default_max_set_anchors(),
            fiber_match_neurons: default_fiber_match_neurons(),
            max_fibers: default_max_fibers(),
            max_reported_activations: default_max_reported_activations(),
            max_subgraph_neurons: default_max_subgraph_neurons(),
        }
    }
}

fn default_strategy() -> ActivationStrategy {
    ActivationStrategy::Hybrid
}

fn default_enabled() -> bool {
    true
}

fn default_max_contributing() -> usize {
    5
}

fn default_max_context_tokens() -> usize {
    500
}

fn default_hybrid_discovery_dampening() -> f32 {
    0.5
}

fn default_max_anchors_per_time_hint() -> usize {
    5
}

fn default_max_anchors_per_entity() -> usize {
    3
}

fn default_max_set_anchors() -> usize {
    10
}

fn default_max_keywords() -> usize {
    5
}

fn default_max_anchors_per_keyword() -> usize {
    2
}

fn default_fiber_match_neurons() -> usize {
    20
}

fn default_max_fibers() -> usize {
    10
}

fn default_max_reported_activations() -> usize {
    20
}

fn default_max_subgraph_neurons() -> usize {
    50
}

/// Output of the ACTIVATE stage
struct Activated {
    activations: ActivationMap,
    intersection_ids: Vec<Uuid>,
    co_activations: Vec<CoActivation>,
}

/// Query pipeline over a graph store
pub struct ReflexPipeline<'a> {
    store: &'a dyn GraphStore,
    parser: &'a dyn QueryParser,
    config: Config,
}

impl<'a> ReflexPipeline<'a> {
    pub fn new(store: &'a dyn GraphStore, parser: &'a dyn QueryParser, config: Config) -> Self {
        Self {
            store,
            parser,
            config,
        }
    }

    /// Create a pipeline with default configuration
    pub fn with_defaults(store: &'a dyn GraphStore, parser: &'a dyn QueryParser) -> Self {
        Self::new(store, parser, Config::default())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Answer a query from memory.
    ///
    /// `depth` overrides depth detection when given.
    #[instrument(skip(self), fields(strategy = ?self.config.pipeline.strategy))]
    pub async fn query(
        &self,
        text: &str,
        reference_time: DateTime<Utc>,
        depth: Option<DepthLevel>,
    ) -> Result<RetrievalResult> {
        let started = Instant::now();
        let pipeline = &self.config.pipeline;

        let stimulus = self.parser.parse(text, reference_time);
        let depth_used = depth.unwrap_or_else(|| detect_depth(&stimulus));
        let max_hops = depth_used.max_hops(self.config.activation.max_spread_hops);
        debug!(intent = ?stimulus.intent, depth = ?depth_used, max_hops, "Query parsed");

        let anchor_sets = self.find_anchors(&stimulus).await?;
        if anchor_sets.is_empty() {
            info!("No anchors found for query");
            let mut result = RetrievalResult::empty(depth_used, no_match_context(text));
            result.latency_ms = elapsed_ms(started);
            return Ok(result);
        }

        let Activated {
            mut activations,
            intersection_ids,
            co_activations,
        } = self
            .activate(&anchor_sets, max_hops, reference_time)
            .await?;

        if pipeline.enable_inhibition {
            activations = apply_lateral_inhibition(&activations, &self.config.inhibition);
        }
        let mut stabilization = None;
        if pipeline.enable_stabilization {
            let (stabilized, report) = stabilize(&activations, &self.config.stabilization);
            activations = stabilized;
            stabilization = Some(report);
        }
        let intersection_ids: Vec<Uuid> = intersection_ids
            .into_iter()
            .filter(|id| activations.contains_key(id))
            .collect();

        if activations.is_empty() {
            info!("Activation left no neurons standing");
            let mut result = RetrievalResult::empty(depth_used, no_match_context(text));
            result.latency_ms = elapsed_ms(started);
            return Ok(result);
        }

        let fibers = self.match_fibers(&activations).await?;

        let reconstruction = reconstruct_answer(
            self.store,
            &activations,
            &intersection_ids,
            &fibers,
            pipeline.max_contributing,
            reference_time,
        )
        .await?;

        let top_ids: Vec<Uuid> = ranked(&activations)
            .iter()
            .take(pipeline.fiber_match_neurons)
            .map(|r| r.neuron_id)
            .collect();
        let top_neurons = self.store.get_neurons_batch(&top_ids).await?;
        let context = format_context(&fibers, &top_neurons, pipeline.max_context_tokens);

        let subgraph = SpreadingActivation::new(self.store, self.config.activation)
            .get_activated_subgraph(
                &activations,
                self.config.activation.min_activation,
                pipeline.max_subgraph_neurons,
            )
            .await?;
        let mut anchor_ids: Vec<Uuid> = anchor_sets.iter().flatten().copied().collect();
        anchor_ids.sort();
        anchor_ids.dedup();

        let mut metadata = HashMap::new();
        metadata.insert("intent".to_string(), serde_json::to_value(stimulus.intent)?);
        metadata.insert(
            "strategy".to_string(),
            serde_json::to_value(pipeline.strategy)?,
        );
        metadata.insert("max_hops".to_string(), serde_json::json!(max_hops));
        metadata.insert(
            "anchor_sets".to_string(),
            serde_json::json!(anchor_sets.len()),
        );
        if let Some(report) = stabilization {
            metadata.insert("stabilization".to_string(), serde_json::to_value(report)?);
        }

        let result = RetrievalResult {
            answer: reconstruction.answer,
            confidence: reconstruction.confidence,
            depth_used,
            neurons_activated: activations.len(),
            fibers_matched: fibers.iter().map(|f| f.id).collect(),
            subgraph: RetrievalSubgraph {
                neuron_ids: subgraph.neuron_ids,
                synapse_ids: subgraph.synapse_ids,
                anchor_ids,
            },
            context,
            latency_ms: elapsed_ms(started),
            co_activations,
            score_breakdown: reconstruction.score_breakdown,
            contributing_neuron_ids: reconstruction.contributing_neuron_ids,
            synthesis_method: reconstruction.method,
            activations: ranked(&activations)
                .into_iter()
                .take(pipeline.max_reported_activations)
                .cloned()
                .collect(),
            metadata,
        };

        info!(
            depth = ?result.depth_used,
            activated = result.neurons_activated,
            fibers = result.fibers_matched.len(),
            method = ?result.synthesis_method,
            confidence = result.confidence,
            latency_ms = result.latency_ms,
            "Query complete"
        );
        Ok(result)
    }

    /// Resolve the stimulus into up to three anchor sets: time, entity, keyword.
    ///
    /// Empty sets are omitted and ids are unique within a set.
    async fn find_anchors(&self, stimulus: &Stimulus) -> Result<Vec<Vec<Uuid>>> {
        let pipeline = &self.config.pipeline;
        let mut sets = Vec::with_capacity(3);

        let mut time_anchors = AnchorSet::new(usize::MAX);
        for hint in &stimulus.time_hints {
            let query = NeuronQuery::new()
                .with_type(NeuronType::Time)
                .within(hint.start, hint.end)
                .with_limit(pipeline.max_anchors_per_time_hint);
            time_anchors.extend(self.store.find_neurons(&query).await?.iter().map(|n| n.id));
        }
        sets.push(time_anchors.into_ids());

        let mut entity_anchors = AnchorSet::new(pipeline.max_entity_anchors);
        for entity in &stimulus.entities {
            if entity_anchors.is_full() {
                break;
            }
            let query = NeuronQuery::new()
                .with_content(entity.text.as_str())
                .with_limit(pipeline.max_anchors_per_entity);
            entity_anchors.extend(self.store.find_neurons(&query).await?.iter().map(|n| n.id));
        }
        sets.push(entity_anchors.into_ids());

        let mut keyword_anchors = AnchorSet::new(pipeline.max_keyword_anchors);
        for keyword in stimulus.keywords.iter().take(pipeline.max_keywords) {
            if keyword_anchors.is_full() {
                break;
            }
            let query = NeuronQuery::new()
                .with_content(keyword.as_str())
                .with_limit(pipeline.max_anchors_per_keyword);
            keyword_anchors.extend(self.store.find_neurons(&query).await?.iter().map(|n| n.id));
        }
        sets.push(keyword_anchors.into_ids());

        sets.retain(|set| !set.is_empty());
        debug!(
            sets = sets.len(),
            anchors = sets.iter().map(Vec::len).sum::<usize>(),
            "Anchors resolved"
        );
        Ok(sets)
    }

    async fn activate(
        &self,
        anchor_sets: &[Vec<Uuid>],
        max_hops: usize,
        reference_time: DateTime<Utc>,
    ) -> Result<Activated> {
        let spreading = SpreadingActivation::new(self.store, self.config.activation);

        let activated = match self.config.pipeline.strategy {
            ActivationStrategy::Classic => {
                let (activations, intersection_ids) =
                    spreading.activate_from_multiple(anchor_sets, max_hops).await?;
                Activated {
                    activations,
                    intersection_ids,
                    co_activations: Vec::new(),
                }
            }
            ActivationStrategy::Reflex => self.activate_reflex(anchor_sets, reference_time).await?,
            ActivationStrategy::Hybrid => {
                let mut activated = self.activate_reflex(anchor_sets, reference_time).await?;
                let discovery_hops = (max_hops / 2).max(1);
                let (classic, classic_intersections) = spreading
                    .activate_from_multiple(anchor_sets, discovery_hops)
                    .await?;
                let classic_intersections: HashSet<Uuid> =
                    classic_intersections.into_iter().collect();

                let dampening = self.config.pipeline.hybrid_discovery_dampening.clamp(0.0, 1.0);
                let scale = discovery_scale(&activated.activations, &classic);
                let mut discovered = 0usize;
                for (id, mut result) in classic {
                    if activated.activations.contains_key(&id) {
                        continue;
                    }
                    result.level = (result.level * scale * dampening).min(1.0);
                    if result.level < self.config.activation.min_activation {
                        continue;
                    }
                    if classic_intersections.contains(&id) {
                        activated.intersection_ids.push(id);
                    }
                    activated.activations.insert(id, result);
                    discovered += 1;
                }
                debug!(discovered, discovery_hops, scale, "Hybrid discovery merged");
                activated
            }
        };

        debug!(
            activated = activated.activations.len(),
            intersections = activated.intersection_ids.len(),
            co_activations = activated.co_activations.len(),
            "Activation stage complete"
        );
        Ok(activated)
    }

    async fn activate_reflex(
        &self,
        anchor_sets: &[Vec<Uuid>],
        reference_time: DateTime<Utc>,
    ) -> Result<Activated> {
        let mut seen = HashSet::new();
        let mut fibers = Vec::new();
        for anchor in anchor_sets.iter().flatten() {
            for fiber in self
                .store
                .find_fibers(&FiberQuery::new().containing(*anchor))
                .await?
            {
                if seen.insert(fiber.id) {
                    fibers.push(fiber);
                }
            }
        }

        let co_binding = ReflexActivation::new(self.config.reflex).activate_with_co_binding(
            &anchor_sets,
            &fibers,
            reference_time,
        );
        Ok(Activated {
            activations: co_binding.activations,
            intersection_ids: co_binding.intersection_ids,
            co_activations: co_binding.co_activations,
        })
    }

    /// Fibers holding the strongest neurons, most salient first
    async fn match_fibers(&self, activations: &ActivationMap) -> Result<Vec<Fiber>> {
        let pipeline = &self.config.pipeline;
        let mut seen = HashSet::new();
        let mut fibers = Vec::new();
        for result in ranked(activations).into_iter().take(pipeline.fiber_match_neurons) {
            for fiber in self
                .store
                .find_fibers(&FiberQuery::new().containing(result.neuron_id))
                .await?
            {
                if seen.insert(fiber.id) {
                    fibers.push(fiber);
                }
            }
        }
        fibers.sort_by(|a, b| {
            b.salience
                .total_cmp(&a.salience)
                .then_with(|| a.id.cmp(&b.id))
        });
        fibers.truncate(pipeline.max_fibers);
        debug!(matched = fibers.len(), "Fibers matched");
        Ok(fibers)
    }
}

/// Capped list of unique anchor ids
struct AnchorSet {
    ids: Vec<Uuid>,
    seen: HashSet<Uuid>,
    cap: usize,
}

impl AnchorSet {
    fn new(cap: usize) -> Self {
        Self {
            ids: Vec::new(),
            seen: HashSet::new(),
            cap,
        }
    }

    fn is_full(&self) -> bool {
        self.ids.len() >= self.cap
    }

    fn extend(&mut self, ids: impl Iterator<Item = Uuid>) {
        for id in ids {
            if self.is_full() {
                break;
            }
            if self.seen.insert(id) {
                self.ids.push(id);
            }
        }
    }

    fn into_ids(self) -> Vec<Uuid> {
        self.ids
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

/// Upper bound on the classic-to-reflex rescaling factor
const MAX_DISCOVERY_SCALE: f32 = 4.0;

/// Ratio between reflex and classic levels over the non-anchor neurons both
/// engines reached, bounded to `[1, MAX_DISCOVERY_SCALE]`.
///
/// Classic levels decay per hop by `decay_factor * weight` while trail levels
/// decay per step by the fiber's conductivity, so the two maps are not on the
/// same scale. Discoveries are rescaled by this ratio before dampening. With
/// no shared neuron the classic scale is used as is.
fn discovery_scale(reflex: &ActivationMap, classic: &ActivationMap) -> f32 {
    let (reflex_total, classic_total) = classic
        .iter()
        .filter(|(_, r)| r.hop_distance > 0)
        .filter_map(|(id, c)| reflex.get(id).map(|r| (r.level, c.level)))
        .fold((0.0_f32, 0.0_f32), |(rt, ct), (r, c)| (rt + r, ct + c));
    if classic_total <= 0.0 || !reflex_total.is_finite() {
        return 1.0;
    }
    (reflex_total / classic_total).clamp(1.0, MAX_DISCOVERY_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationResult;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.strategy, ActivationStrategy::Hybrid);
        assert!(config.enable_inhibition);
        assert!(config.enable_stabilization);
        assert_eq!(config.max_contributing, 5);
        assert_eq!(config.max_context_tokens, 500);
        assert_eq!(config.hybrid_discovery_dampening, 0.5);
        assert_eq!(config.max_anchors_per_entity, 3);
        assert_eq!(config.max_entity_anchors, 10);
        assert_eq!(config.max_keywords, 5);
        assert_eq!(config.max_anchors_per_keyword, 2);
        assert_eq!(config.max_keyword_anchors, 10);
        assert_eq!(config.fiber_match_neurons, 20);
        assert_eq!(config.max_fibers, 10);
    }

    #[test]
    fn test_pipeline_config_partial_toml() {
        let config: PipelineConfig = toml::from_str(
            r#"
            strategy = "classic"
            enable_stabilization = false
            "#,
        )
        .unwrap();
        assert_eq!(config.strategy, ActivationStrategy::Classic);
        assert!(!config.enable_stabilization);
        assert!(config.enable_inhibition);
        assert_eq!(config.max_fibers, 10);
    }

    fn reached(id: Uuid, level: f32, hop_distance: usize) -> (Uuid, ActivationResult) {
        let mut result = ActivationResult::anchor(id);
        result.level = level;
        result.hop_distance = hop_distance;
        (id, result)
    }

    #[test]
    fn test_discovery_scale_matches_shared_neurons() {
        let anchor = Uuid::new_v4();
        let shared = Uuid::new_v4();
        let discovered = Uuid::new_v4();
        let reflex: ActivationMap = [reached(anchor, 1.0, 0), reached(shared, 0.85, 1)].into();
        let classic: ActivationMap = [
            reached(anchor, 1.0, 0),
            reached(shared, 0.4, 1),
            reached(discovered, 0.14, 2),
        ]
        .into();
        let scale = discovery_scale(&reflex, &classic);
        assert!((scale - 2.125).abs() < 1e-5, "scale {scale}");
    }

    #[test]
    fn test_discovery_scale_defaults_and_bounds() {
        let anchor = Uuid::new_v4();
        let shared = Uuid::new_v4();
        let only_anchor: ActivationMap = [reached(anchor, 1.0, 0)].into();
        assert_eq!(discovery_scale(&only_anchor, &only_anchor), 1.0);

        let reflex: ActivationMap = [reached(shared, 0.9, 1)].into();
        let faint: ActivationMap = [reached(shared, 0.01, 1)].into();
        assert_eq!(discovery_scale(&reflex, &faint), MAX_DISCOVERY_SCALE);

        let weak_reflex: ActivationMap = [reached(shared, 0.2, 1)].into();
        let strong: ActivationMap = [reached(shared, 0.8, 1)].into();
        assert_eq!(discovery_scale(&weak_reflex, &strong), 1.0);
    }

    #[test]
    fn test_anchor_set_caps_and_dedupes() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let mut set = AnchorSet::new(2);
        set.extend([a, a, b, c].into_iter());
        assert!(set.is_full());
        assert_eq!(set.into_ids(), vec![a, b]);
    }
}
