//! Test utilities for synaptic - graph fixtures and mocks
//!
//! - `GraphBuilder` assembles an `InMemoryStore` from neurons, links and fibers
//! - `KeywordParser` is a deterministic `QueryParser` for pipeline tests
//! - `FailingStore` returns a storage error from every call
//! - `init_test_logging` installs a tracing subscriber honouring `RUST_LOG`

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use crate::error::{Result, SynapticError};
use crate::graph::{Fiber, Neuron, NeuronState, NeuronType, Synapse, SynapseType};
use crate::parser::{QueryIntent, QueryParser, Stimulus, TimeHint};
use crate::storage::{
    FiberQuery, GraphStore, InMemoryStore, NeuronQuery, SynapseQuery, TraversalDirection,
};

/// Install a test-friendly tracing subscriber once per test binary.
///
/// Defaults to `warn`; set `RUST_LOG=synaptic=debug` to see pipeline stages.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

/// Builds an in-memory graph for tests.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    neurons: Vec<Neuron>,
    states: Vec<NeuronState>,
    synapses: Vec<Synapse>,
    fibers: Vec<Fiber>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a neuron and return its id
    pub fn neuron(&mut self, neuron_type: NeuronType, content: &str) -> Uuid {
        self.add_neuron(Neuron::new(neuron_type, content))
    }

    /// Add a prepared neuron and return its id
    pub fn add_neuron(&mut self, neuron: Neuron) -> Uuid {
        let id = neuron.id;
        self.neurons.push(neuron);
        id
    }

    /// Attach an activation state to a neuron
    pub fn state(&mut self, state: NeuronState) -> &mut Self {
        self.states.push(state);
        self
    }

    /// Add a synapse and return its id
    pub fn link(&mut self, source: Uuid, target: Uuid, synapse_type: SynapseType, weight: f32) -> Uuid {
        let synapse = Synapse::new(source, target, synapse_type, weight);
        let id = synapse.id;
        self.synapses.push(synapse);
        id
    }

    /// Add a fiber whose pathway is `pathway`, anchored at its first neuron.
    ///
    /// Synapses already linking two pathway neurons become part of the fiber.
    ///
    /// # Panics
    ///
    /// Panics if `pathway` is empty.
    pub fn fiber(&mut self, pathway: &[Uuid]) -> Uuid {
        let fiber = self.pathway_fiber(pathway);
        self.add_fiber(fiber)
    }

    /// Like `fiber`, with a summary
    ///
    /// # Panics
    ///
    /// Panics if `pathway` is empty.
    pub fn fiber_with_summary(&mut self, pathway: &[Uuid], summary: &str) -> Uuid {
        let fiber = self.pathway_fiber(pathway).with_summary(summary);
        self.add_fiber(fiber)
    }

    /// Add a prepared fiber and return its id
    pub fn add_fiber(&mut self, fiber: Fiber) -> Uuid {
        let id = fiber.id;
        self.fibers.push(fiber);
        id
    }

    fn pathway_fiber(&self, pathway: &[Uuid]) -> Fiber {
        assert!(!pathway.is_empty(), "fiber pathway must not be empty");
        let members: HashSet<Uuid> = pathway.iter().copied().collect();
        let synapse_ids: Vec<Uuid> = self
            .synapses
            .iter()
            .filter(|s| members.contains(&s.source_id) && members.contains(&s.target_id))
            .map(|s| s.id)
            .collect();
        Fiber::new(pathway.iter().copied(), synapse_ids, pathway[0]).with_pathway(pathway.to_vec())
    }

    /// Load everything into a fresh store
    pub async fn build(self) -> Result<InMemoryStore> {
        let store = InMemoryStore::new();
        for neuron in &self.neurons {
            store.insert_neuron(neuron).await;
        }
        for state in &self.states {
            store.update_neuron_state(state).await?;
        }
        for synapse in &self.synapses {
            store.insert_synapse(synapse).await?;
        }
        for fiber in &self.fibers {
            store.insert_fiber(fiber).await;
        }
        Ok(store)
    }
}

const STOPWORDS: &[&str] = &[
    "the", "and", "did", "does", "was", "were", "are", "is", "what", "why", "how", "who", "when",
    "where", "for", "with", "that", "this", "about", "from", "have", "has", "had", "you", "your",
    "happen", "happened", "tell", "me",
];

/// Deterministic query parser for tests.
///
/// Intent comes from question words, entities are capitalized words after
/// the first, keywords are the remaining non-stopwords of three or more
/// letters. Time hints are supplied up front since this parser does not read
/// dates.
#[derive(Debug, Clone, Default)]
pub struct KeywordParser {
    time_hints: Vec<TimeHint>,
}

impl KeywordParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a time hint to every parsed stimulus
    pub fn with_time_hint(mut self, hint: TimeHint) -> Self {
        self.time_hints.push(hint);
        self
    }

    fn intent(words: &[String]) -> QueryIntent {
        let has = |w: &str| words.iter().any(|x| x == w);
        if has("why") {
            QueryIntent::AskWhy
        } else if has("feel") || has("felt") {
            QueryIntent::AskFeeling
        } else if has("usually") || has("often") {
            QueryIntent::AskPattern
        } else if has("compare") || has("versus") {
            QueryIntent::Compare
        } else if has("how") {
            QueryIntent::AskHow
        } else if has("when") {
            QueryIntent::AskWhen
        } else if has("where") {
            QueryIntent::AskWhere
        } else if has("who") {
            QueryIntent::AskWho
        } else if has("what") {
            QueryIntent::AskWhat
        } else {
            QueryIntent::Recall
        }
    }
}

impl QueryParser for KeywordParser {
    fn parse(&self, text: &str, _reference_time: DateTime<Utc>) -> Stimulus {
        let tokens: Vec<&str> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();

        let entities: Vec<&str> = tokens
            .iter()
            .skip(1)
            .filter(|t| t.chars().next().is_some_and(char::is_uppercase))
            .copied()
            .collect();

        let mut seen = HashSet::new();
        let keywords: Vec<&str> = lowered
            .iter()
            .map(String::as_str)
            .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
            .filter(|w| seen.insert(*w))
            .collect();

        let mut stimulus = Stimulus::new(text, Self::intent(&lowered))
            .with_entities(entities)
            .with_keywords(keywords);
        for hint in &self.time_hints {
            stimulus = stimulus.with_time_hint(*hint);
        }
        stimulus
    }
}

/// Store whose every call fails with a storage error
#[derive(Debug, Clone, Default)]
pub struct FailingStore;

impl FailingStore {
    fn fail<T>() -> Result<T> {
        Err(SynapticError::Storage("backend unavailable".to_string()))
    }
}

#[async_trait]
impl GraphStore for FailingStore {
    async fn get_neuron(&self, _id: Uuid) -> Result<Option<Neuron>> {
        Self::fail()
    }

    async fn get_neurons_batch(&self, _ids: &[Uuid]) -> Result<Vec<Neuron>> {
        Self::fail()
    }

    async fn get_neuron_state(&self, _id: Uuid) -> Result<Option<NeuronState>> {
        Self::fail()
    }

    async fn update_neuron_state(&self, _state: &NeuronState) -> Result<()> {
        Self::fail()
    }

    async fn find_neurons(&self, _query: &NeuronQuery) -> Result<Vec<Neuron>> {
        Self::fail()
    }

    async fn get_neighbors(
        &self,
        _neuron_id: Uuid,
        _direction: TraversalDirection,
        _synapse_types: Option<&[SynapseType]>,
        _min_weight: Option<f32>,
    ) -> Result<Vec<(Neuron, Synapse)>> {
        Self::fail()
    }

    async fn get_synapses(&self, _query: &SynapseQuery) -> Result<Vec<Synapse>> {
        Self::fail()
    }

    async fn find_fibers(&self, _query: &FiberQuery) -> Result<Vec<Fiber>> {
        Self::fail()
    }

    async fn get_fiber(&self, _id: Uuid) -> Result<Option<Fiber>> {
        Self::fail()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_parser_extracts_cues() {
        let stimulus = KeywordParser::new().parse("Why did Alice cancel the launch?", Utc::now());
        assert_eq!(stimulus.intent, QueryIntent::AskWhy);
        assert_eq!(stimulus.entities.len(), 1);
        assert_eq!(stimulus.entities[0].text, "Alice");
        assert_eq!(stimulus.keywords, vec!["alice", "cancel", "launch"]);
    }

    #[test]
    fn keyword_parser_is_deterministic() {
        let parser = KeywordParser::new();
        let now = Utc::now();
        assert_eq!(
            parser.parse("how often do we deploy", now),
            parser.parse("how often do we deploy", now)
        );
    }

    #[tokio::test]
    async fn graph_builder_loads_store() {
        let mut graph = GraphBuilder::new();
        let a = graph.neuron(NeuronType::Entity, "alpha");
        let b = graph.neuron(NeuronType::Entity, "beta");
        graph.link(a, b, SynapseType::RelatedTo, 0.5);
        let fiber = graph.fiber(&[a, b]);
        let store = graph.build().await.unwrap();

        assert_eq!(store.neuron_count().await, 2);
        assert_eq!(store.synapse_count().await, 1);
        let loaded = store.get_fiber(fiber).await.unwrap().unwrap();
        assert_eq!(loaded.pathway, vec![a, b]);
        assert_eq!(loaded.synapse_ids.len(), 1);
    }

    #[tokio::test]
    async fn failing_store_reports_storage_error() {
        let err = FailingStore.get_neuron(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SynapticError::Storage(_)));
    }

    #[test]
    #[should_panic(expected = "fiber pathway must not be empty")]
    fn graph_builder_rejects_empty_pathway() {
        let mut graph = GraphBuilder::new();
        graph.fiber(&[]);
    }
}
