//! In-memory `GraphStore` implementation
//!
//! Keeps neurons, synapses and fibers in id-keyed maps with adjacency and
//! fiber-membership indexes. Used by tests and by embedders that load a graph
//! snapshot into memory.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;
use uuid::Uuid;

use crate::error::{Result, SynapticError};
use crate::graph::{Fiber, Neuron, NeuronState, Synapse, SynapseType};
use crate::storage::GraphStore;
use crate::storage::filter::{FiberQuery, NeuronQuery, SynapseQuery, TraversalDirection};

#[derive(Debug, Default)]
struct GraphIndex {
    neurons: HashMap<Uuid, Neuron>,
    states: HashMap<Uuid, NeuronState>,
    synapses: HashMap<Uuid, Synapse>,
    outgoing: HashMap<Uuid, Vec<Uuid>>,
    incoming: HashMap<Uuid, Vec<Uuid>>,
    fibers: HashMap<Uuid, Fiber>,
    fibers_by_neuron: HashMap<Uuid, HashSet<Uuid>>,
}

impl GraphIndex {
    fn unlink_synapse(&mut self, synapse: &Synapse) {
        if let Some(ids) = self.outgoing.get_mut(&synapse.source_id) {
            ids.retain(|id| *id != synapse.id);
        }
        if let Some(ids) = self.incoming.get_mut(&synapse.target_id) {
            ids.retain(|id| *id != synapse.id);
        }
    }

    fn unlink_fiber(&mut self, fiber: &Fiber) {
        for neuron_id in &fiber.neuron_ids {
            if let Some(ids) = self.fibers_by_neuron.get_mut(neuron_id) {
                ids.remove(&fiber.id);
            }
        }
    }
}

/// Thread-safe in-memory graph store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<GraphIndex>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a neuron (replacement keeps the id)
    pub async fn insert_neuron(&self, neuron: &Neuron) {
        let mut index = self.inner.write().await;
        index.neurons.insert(neuron.id, neuron.clone());
    }

    /// Insert or replace a synapse. Both endpoints must exist.
    pub async fn insert_synapse(&self, synapse: &Synapse) -> Result<()> {
        let mut index = self.inner.write().await;
        for endpoint in [synapse.source_id, synapse.target_id] {
            if !index.neurons.contains_key(&endpoint) {
                return Err(SynapticError::NotFound(format!(
                    "neuron {endpoint} referenced by synapse {}",
                    synapse.id
                )));
            }
        }
        if let Some(previous) = index.synapses.remove(&synapse.id) {
            index.unlink_synapse(&previous);
        }
        index
            .outgoing
            .entry(synapse.source_id)
            .or_default()
            .push(synapse.id);
        index
            .incoming
            .entry(synapse.target_id)
            .or_default()
            .push(synapse.id);
        index.synapses.insert(synapse.id, synapse.clone());
        Ok(())
    }

    /// Insert or replace a fiber
    pub async fn insert_fiber(&self, fiber: &Fiber) {
        let mut index = self.inner.write().await;
        if let Some(previous) = index.fibers.remove(&fiber.id) {
            index.unlink_fiber(&previous);
        }
        for neuron_id in &fiber.neuron_ids {
            index
                .fibers_by_neuron
                .entry(*neuron_id)
                .or_default()
                .insert(fiber.id);
        }
        index.fibers.insert(fiber.id, fiber.clone());
    }

    /// Remove a neuron together with its synapses and state
    pub async fn remove_neuron(&self, id: Uuid) -> bool {
        let mut index = self.inner.write().await;
        if index.neurons.remove(&id).is_none() {
            return false;
        }
        index.states.remove(&id);
        let touching: Vec<Uuid> = index
            .outgoing
            .remove(&id)
            .unwrap_or_default()
            .into_iter()
            .chain(index.incoming.remove(&id).unwrap_or_default())
            .collect();
        for synapse_id in touching {
            if let Some(synapse) = index.synapses.remove(&synapse_id) {
                index.unlink_synapse(&synapse);
            }
        }
        true
    }

    pub async fn neuron_count(&self) -> usize {
        self.inner.read().await.neurons.len()
    }

    pub async fn synapse_count(&self) -> usize {
        self.inner.read().await.synapses.len()
    }

    pub async fn fiber_count(&self) -> usize {
        self.inner.read().await.fibers.len()
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn get_neuron(&self, id: Uuid) -> Result<Option<Neuron>> {
        Ok(self.inner.read().await.neurons.get(&id).cloned())
    }

    async fn get_neurons_batch(&self, ids: &[Uuid]) -> Result<Vec<Neuron>> {
        let index = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| index.neurons.get(id).cloned())
            .collect())
    }

    async fn get_neuron_state(&self, id: Uuid) -> Result<Option<NeuronState>> {
        Ok(self.inner.read().await.states.get(&id).cloned())
    }

    async fn update_neuron_state(&self, state: &NeuronState) -> Result<()> {
        let mut index = self.inner.write().await;
        if !index.neurons.contains_key(&state.neuron_id) {
            return Err(SynapticError::NotFound(format!(
                "neuron {}",
                state.neuron_id
            )));
        }
        index.states.insert(state.neuron_id, state.clone());
        Ok(())
    }

    async fn find_neurons(&self, query: &NeuronQuery) -> Result<Vec<Neuron>> {
        let index = self.inner.read().await;
        let mut found: Vec<Neuron> = index
            .neurons
            .values()
            .filter(|n| query.matches(n))
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        found.truncate(query.limit);
        Ok(found)
    }

    async fn get_neighbors(
        &self,
        neuron_id: Uuid,
        direction: TraversalDirection,
        synapse_types: Option<&[SynapseType]>,
        min_weight: Option<f32>,
    ) -> Result<Vec<(Neuron, Synapse)>> {
        let index = self.inner.read().await;
        let empty = Vec::new();
        let outgoing = index.outgoing.get(&neuron_id).unwrap_or(&empty);
        let incoming = index.incoming.get(&neuron_id).unwrap_or(&empty);

        let mut seen = HashSet::new();
        let mut neighbors = Vec::new();

        let edges = outgoing
            .iter()
            .map(|id| (id, true))
            .chain(incoming.iter().map(|id| (id, false)));

        for (synapse_id, leaving) in edges {
            let Some(synapse) = index.synapses.get(synapse_id) else {
                continue;
            };
            let traversable = match direction {
                TraversalDirection::Both => true,
                TraversalDirection::Outgoing => leaving || synapse.is_bidirectional(),
                TraversalDirection::Incoming => !leaving || synapse.is_bidirectional(),
            };
            if !traversable {
                continue;
            }
            if synapse_types.is_some_and(|types| !types.contains(&synapse.synapse_type)) {
                continue;
            }
            if min_weight.is_some_and(|w| synapse.weight < w) {
                continue;
            }
            if !seen.insert(synapse.id) {
                continue;
            }
            let Some(other_id) = synapse.other_end(neuron_id) else {
                continue;
            };
            if let Some(neighbor) = index.neurons.get(&other_id) {
                neighbors.push((neighbor.clone(), synapse.clone()));
            }
        }

        trace!(%neuron_id, count = neighbors.len(), "Neighbors fetched");
        Ok(neighbors)
    }

    async fn get_synapses(&self, query: &SynapseQuery) -> Result<Vec<Synapse>> {
        let index = self.inner.read().await;
        let candidates: Vec<&Synapse> = match (query.source_id, query.target_id) {
            (Some(source), _) => index
                .outgoing
                .get(&source)
                .map(|ids| ids.iter().filter_map(|id| index.synapses.get(id)).collect())
                .unwrap_or_default(),
            (None, Some(target)) => index
                .incoming
                .get(&target)
                .map(|ids| ids.iter().filter_map(|id| index.synapses.get(id)).collect())
                .unwrap_or_default(),
            (None, None) => index.synapses.values().collect(),
        };
        Ok(candidates
            .into_iter()
            .filter(|s| query.matches(s))
            .cloned()
            .collect())
    }

    async fn find_fibers(&self, query: &FiberQuery) -> Result<Vec<Fiber>> {
        let index = self.inner.read().await;
        let mut found: Vec<Fiber> = match query.contains_neuron {
            Some(neuron_id) => index
                .fibers_by_neuron
                .get(&neuron_id)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| index.fibers.get(id))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
                .into_iter()
                .filter(|f| query.matches(f))
                .cloned()
                .collect(),
            None => index
                .fibers
                .values()
                .filter(|f| query.matches(f))
                .cloned()
                .collect(),
        };
        found.sort_by(|a, b| {
            b.salience
                .total_cmp(&a.salience)
                .then_with(|| a.id.cmp(&b.id))
        });
        found.truncate(query.limit);
        Ok(found)
    }

    async fn get_fiber(&self, id: Uuid) -> Result<Option<Fiber>> {
        Ok(self.inner.read().await.fibers.get(&id).cloned())
    }
}
