//! Synaptic - associative memory retrieval for agents
//!
//! Memories live in a graph of neurons (semantic atoms) connected by typed,
//! weighted synapses and grouped into fibers. Queries are answered by
//! activating anchor neurons and letting activation spread through the graph,
//! then reconstructing an answer from whatever lights up. Synapse weights are
//! adjusted from usage with a Hebbian rule.

pub mod activation;
pub mod config;
pub mod error;
pub mod graph;
pub mod learning;
pub mod parser;
pub mod retrieval;
pub mod storage;
pub mod testing;

pub use config::Config;
pub use error::SynapticError;
