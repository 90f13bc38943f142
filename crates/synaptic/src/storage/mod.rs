//! Graph storage interface
//!
//! The retrieval core is storage-agnostic: it only talks to a `GraphStore`.
//! Any backend error is returned as `SynapticError::Storage` and propagated
//! unchanged; ids that no longer exist come back as `None` or are omitted.

pub mod filter;
pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::graph::{Fiber, Neuron, NeuronState, Synapse, SynapseType};

pub use filter::{FiberQuery, NeuronQuery, SynapseQuery, TraversalDirection};
pub use memory::InMemoryStore;

/// Async, read-mostly view of the memory graph used by retrieval.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Fetch a single neuron
    async fn get_neuron(&self, id: Uuid) -> Result<Option<Neuron>>;

    /// Fetch many neurons; missing ids are skipped
    async fn get_neurons_batch(&self, ids: &[Uuid]) -> Result<Vec<Neuron>>;

    /// Fetch the activation state of a neuron
    async fn get_neuron_state(&self, id: Uuid) -> Result<Option<NeuronState>>;

    /// Insert or replace the activation state of a neuron
    async fn update_neuron_state(&self, state: &NeuronState) -> Result<()>;

    /// Find neurons matching the query, capped at `query.limit`
    async fn find_neurons(&self, query: &NeuronQuery) -> Result<Vec<Neuron>>;

    /// Neighbors of a neuron together with the connecting synapse.
    ///
    /// Hot path of spreading activation; implementations must use an
    /// adjacency index rather than scanning every synapse.
    async fn get_neighbors(
        &self,
        neuron_id: Uuid,
        direction: TraversalDirection,
        synapse_types: Option<&[SynapseType]>,
        min_weight: Option<f32>,
    ) -> Result<Vec<(Neuron, Synapse)>>;

    /// Synapses matching the query
    async fn get_synapses(&self, query: &SynapseQuery) -> Result<Vec<Synapse>>;

    /// Fibers matching the query, capped at `query.limit`
    async fn find_fibers(&self, query: &FiberQuery) -> Result<Vec<Fiber>>;

    /// Fetch a single fiber
    async fn get_fiber(&self, id: Uuid) -> Result<Option<Fiber>>;
}
