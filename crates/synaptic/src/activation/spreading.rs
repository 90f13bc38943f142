//! Classic spreading activation
//!
//! Best-first traversal from a set of anchors. Activation decays by
//! `decay_factor * synapse.weight` on every hop, and the frontier is a max-heap
//! on level so the strongest paths are expanded first.
//!
//! Visited state is keyed by `(neuron, source_anchor)` rather than by neuron,
//! so one neuron can be reached independently from several anchors. That is
//! what lets `activate_from_multiple` detect intersections, and it still
//! terminates on cyclic graphs because levels strictly decrease per hop and
//! are bounded below by `min_activation`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::activation::{ActivationMap, ActivationResult, merge_activation_sets, ranked};
use crate::error::Result;
use crate::storage::{GraphStore, SynapseQuery, TraversalDirection};

/// Configuration for classic spreading activation
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ActivationConfig {
    /// Multiplier applied per hop on top of the synapse weight (default: 0.5)
    #[serde(default = "default_decay_factor")]
    pub decay_factor: f32,
    /// Levels below this are discarded (default: 0.05)
    #[serde(default = "default_min_activation")]
    pub min_activation: f32,
    /// Synapses lighter than this are not traversed (default: 0.1)
    #[serde(default = "default_min_synapse_weight")]
    pub min_synapse_weight: f32,
    /// Hop budget for the deepest queries (default: 4)
    #[serde(default = "default_max_spread_hops")]
    pub max_spread_hops: usize,
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self {
            decay_factor: default_decay_factor(),
            min_activation: default_min_activation(),
            min_synapse_weight: default_min_synapse_weight(),
            max_spread_hops: default_max_spread_hops(),
        }
    }
}

fn default_decay_factor() -> f32 {
    0.5
}

fn default_min_activation() -> f32 {
    0.05
}

fn default_min_synapse_weight() -> f32 {
    0.1
}

fn default_max_spread_hops() -> usize {
    4
}

/// Activated neurons above a threshold plus the synapses connecting them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivatedSubgraph {
    pub neuron_ids: Vec<Uuid>,
    pub synapse_ids: Vec<Uuid>,
}

/// Frontier entry, ordered by level so `BinaryHeap` pops the strongest first
#[derive(Debug)]
struct Frontier {
    level: f32,
    neuron_id: Uuid,
    source_anchor: Uuid,
    hop: usize,
    path: Vec<Uuid>,
}

impl PartialEq for Frontier {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Frontier {}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.level
            .total_cmp(&other.level)
            .then_with(|| other.hop.cmp(&self.hop))
            .then_with(|| self.neuron_id.cmp(&other.neuron_id))
    }
}

/// Spreading activation over a `GraphStore`
pub struct SpreadingActivation<'a> {
    store: &'a dyn GraphStore,
    config: ActivationConfig,
}

impl<'a> SpreadingActivation<'a> {
    pub fn new(store: &'a dyn GraphStore, config: ActivationConfig) -> Self {
        Self { store, config }
    }

    /// Create an engine with default configuration
    pub fn with_defaults(store: &'a dyn GraphStore) -> Self {
        Self::new(store, ActivationConfig::default())
    }

    pub fn config(&self) -> &ActivationConfig {
        &self.config
    }

    /// Spread from `anchor_ids` using the configured decay and threshold
    pub async fn activate(&self, anchor_ids: &[Uuid], max_hops: usize) -> Result<ActivationMap> {
        self.activate_with(
            anchor_ids,
            max_hops,
            self.config.decay_factor,
            self.config.min_activation,
        )
        .await
    }

    /// Spread from `anchor_ids` with explicit decay and threshold.
    ///
    /// Anchors start at level 1.0 and hop 0; anchors that do not exist in the
    /// store are ignored, so an empty or unknown anchor list yields an empty map.
    pub async fn activate_with(
        &self,
        anchor_ids: &[Uuid],
        max_hops: usize,
        decay_factor: f32,
        min_activation: f32,
    ) -> Result<ActivationMap> {
        let mut results = ActivationMap::new();
        if anchor_ids.is_empty() {
            return Ok(results);
        }

        let decay_factor = decay_factor.clamp(0.0, 1.0);
        let mut heap = BinaryHeap::new();
        for anchor in self.store.get_neurons_batch(anchor_ids).await? {
            if results.contains_key(&anchor.id) {
                continue;
            }
            results.insert(anchor.id, ActivationResult::anchor(anchor.id));
            heap.push(Frontier {
                level: 1.0,
                neuron_id: anchor.id,
                source_anchor: anchor.id,
                hop: 0,
                path: vec![anchor.id],
            });
        }

        let mut visited: HashSet<(Uuid, Uuid)> = HashSet::new();
        let mut expansions = 0usize;

        while let Some(current) = heap.pop() {
            if !visited.insert((current.neuron_id, current.source_anchor)) {
                continue;
            }
            if current.hop >= max_hops {
                continue;
            }

            expansions += 1;
            let neighbors = self
                .store
                .get_neighbors(
                    current.neuron_id,
                    TraversalDirection::Both,
                    None,
                    Some(self.config.min_synapse_weight),
                )
                .await?;

            for (neighbor, synapse) in neighbors {
                let level = current.level * decay_factor * synapse.weight;
                if level < min_activation {
                    continue;
                }
                if visited.contains(&(neighbor.id, current.source_anchor)) {
                    continue;
                }
                let improves = results
                    .get(&neighbor.id)
                    .is_none_or(|existing| level > existing.level);
                if !improves {
                    continue;
                }

                let mut path = current.path.clone();
                path.push(neighbor.id);
                results.insert(
                    neighbor.id,
                    ActivationResult {
                        neuron_id: neighbor.id,
                        level,
                        hop_distance: current.hop + 1,
                        path: path.clone(),
                        source_anchor: current.source_anchor,
                    },
                );
                heap.push(Frontier {
                    level,
                    neuron_id: neighbor.id,
                    source_anchor: current.source_anchor,
                    hop: current.hop + 1,
                    path,
                });
            }
        }

        debug!(
            anchors = anchor_ids.len(),
            activated = results.len(),
            expansions,
            "Spreading activation complete"
        );
        Ok(results)
    }

    /// Spread independently from each anchor set and merge the results.
    ///
    /// Returns the combined map and the ids reached by two or more sets.
    pub async fn activate_from_multiple(
        &self,
        anchor_sets: &[Vec<Uuid>],
        max_hops: usize,
    ) -> Result<(ActivationMap, Vec<Uuid>)> {
        let mut maps = Vec::with_capacity(anchor_sets.len());
        for anchors in anchor_sets.iter().filter(|set| !set.is_empty()) {
            maps.push(self.activate(anchors, max_hops).await?);
        }
        let (combined, intersections) = merge_activation_sets(&maps);
        debug!(
            sets = maps.len(),
            combined = combined.len(),
            intersections = intersections.len(),
            "Merged anchor set activations"
        );
        Ok((combined, intersections))
    }

    /// Strongest activations at or above `min_activation`, capped at
    /// `max_neurons`, with the synapses whose both ends were selected.
    pub async fn get_activated_subgraph(
        &self,
        activations: &ActivationMap,
        min_activation: f32,
        max_neurons: usize,
    ) -> Result<ActivatedSubgraph> {
        let neuron_ids: Vec<Uuid> = ranked(activations)
            .into_iter()
            .filter(|r| r.level >= min_activation)
            .take(max_neurons)
            .map(|r| r.neuron_id)
            .collect();
        let selected: HashSet<Uuid> = neuron_ids.iter().copied().collect();

        let mut synapse_ids = Vec::new();
        for id in &neuron_ids {
            let outgoing = self
                .store
                .get_synapses(&SynapseQuery::new().from_source(*id))
                .await?;
            synapse_ids.extend(
                outgoing
                    .into_iter()
                    .filter(|s| selected.contains(&s.target_id))
                    .map(|s| s.id),
            );
        }
        synapse_ids.sort();
        synapse_ids.dedup();

        Ok(ActivatedSubgraph {
            neuron_ids,
            synapse_ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Neuron, NeuronType, Synapse, SynapseType};
    use crate::storage::InMemoryStore;

    async fn insert(store: &InMemoryStore, content: &str) -> Uuid {
        let neuron = Neuron::new(NeuronType::Concept, content);
        store.insert_neuron(&neuron).await;
        neuron.id
    }

    async fn link(store: &InMemoryStore, a: Uuid, b: Uuid, weight: f32) {
        store
            .insert_synapse(&Synapse::new(a, b, SynapseType::LeadsTo, weight))
            .await
            .unwrap();
    }

    #[test]
    fn test_activation_config_default() {
        let config = ActivationConfig::default();
        assert_eq!(config.decay_factor, 0.5);
        assert_eq!(config.min_activation, 0.05);
        assert_eq!(config.min_synapse_weight, 0.1);
        assert_eq!(config.max_spread_hops, 4);
    }

    #[test]
    fn test_frontier_orders_by_level() {
        let mut heap = BinaryHeap::new();
        for level in [0.2, 0.9, 0.5] {
            heap.push(Frontier {
                level,
                neuron_id: Uuid::new_v4(),
                source_anchor: Uuid::nil(),
                hop: 0,
                path: Vec::new(),
            });
        }
        let order: Vec<f32> = std::iter::from_fn(|| heap.pop().map(|f| f.level)).collect();
        assert_eq!(order, vec![0.9, 0.5, 0.2]);
    }

    #[tokio::test]
    async fn test_chain_levels() {
        let store = InMemoryStore::new();
        let a = insert(&store, "a").await;
        let b = insert(&store, "b").await;
        let c = insert(&store, "c").await;
        link(&store, a, b, 0.8).await;
        link(&store, b, c, 0.7).await;

        let engine = SpreadingActivation::with_defaults(&store);
        let result = engine.activate(&[a], 3).await.unwrap();

        assert_eq!(result[&a].level, 1.0);
        assert!((result[&b].level - 0.4).abs() < 1e-6);
        assert!((result[&c].level - 0.14).abs() < 1e-6);
        assert_eq!(result[&c].hop_distance, 2);
        assert_eq!(result[&c].path, vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_max_hops_limits_depth() {
        let store = InMemoryStore::new();
        let a = insert(&store, "a").await;
        let b = insert(&store, "b").await;
        let c = insert(&store, "c").await;
        link(&store, a, b, 0.8).await;
        link(&store, b, c, 0.7).await;

        let engine = SpreadingActivation::with_defaults(&store);
        let result = engine.activate(&[a], 1).await.unwrap();
        assert!(result.contains_key(&b));
        assert!(!result.contains_key(&c));
    }

    #[tokio::test]
    async fn test_cycle_terminates() {
        let store = InMemoryStore::new();
        let a = insert(&store, "a").await;
        let b = insert(&store, "b").await;
        let c = insert(&store, "c").await;
        link(&store, a, b, 1.0).await;
        link(&store, b, c, 1.0).await;
        link(&store, c, a, 1.0).await;

        let engine = SpreadingActivation::with_defaults(&store);
        let result = engine.activate(&[a], 50).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[&a].level, 1.0);
    }

    #[tokio::test]
    async fn test_subgraph_includes_connecting_synapses() {
        let store = InMemoryStore::new();
        let a = insert(&store, "a").await;
        let b = insert(&store, "b").await;
        let c = insert(&store, "c").await;
        link(&store, a, b, 0.8).await;
        link(&store, b, c, 0.7).await;

        let engine = SpreadingActivation::with_defaults(&store);
        let activations = engine.activate(&[a], 3).await.unwrap();
        let subgraph = engine
            .get_activated_subgraph(&activations, 0.3, 10)
            .await
            .unwrap();
        assert_eq!(subgraph.neuron_ids, vec![a, b]);
        assert_eq!(subgraph.synapse_ids.len(), 1);
    }
}
