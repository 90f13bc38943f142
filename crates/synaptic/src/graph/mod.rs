//! Graph data model
//!
//! Neurons, their activation state, synapses and fibers. Entities refer to
//! each other only by `Uuid`, so cycles in the graph cost nothing extra.

pub mod fiber;
pub mod neuron;
pub mod synapse;

pub use fiber::Fiber;
pub use neuron::{Neuron, NeuronState, NeuronType, content_fingerprint};
pub use synapse::{Direction, Synapse, SynapseType};
