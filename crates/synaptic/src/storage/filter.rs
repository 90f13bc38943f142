//! Query types for graph storage lookups
//!
//! All fields are optional - when `None`, that criterion is not applied.
//! Multiple criteria are combined with AND logic.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::graph::{Fiber, Neuron, NeuronType, Synapse, SynapseType};

/// Default result cap for neuron and fiber lookups
pub const DEFAULT_QUERY_LIMIT: usize = 50;

/// Which edges `get_neighbors` follows from a neuron
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    /// Edges leaving the neuron (plus bidirectional edges arriving at it)
    Outgoing,
    /// Edges arriving at the neuron (plus bidirectional edges leaving it)
    Incoming,
    /// Every edge touching the neuron
    Both,
}

/// Criteria for `GraphStore::find_neurons`
#[derive(Debug, Clone)]
pub struct NeuronQuery {
    pub neuron_type: Option<NeuronType>,
    /// Case-insensitive substring match on content
    pub content_contains: Option<String>,
    /// Inclusive creation-time window
    pub time_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub limit: usize,
}

impl Default for NeuronQuery {
    fn default() -> Self {
        Self {
            neuron_type: None,
            content_contains: None,
            time_range: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl NeuronQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, neuron_type: NeuronType) -> Self {
        self.neuron_type = Some(neuron_type);
        self
    }

    pub fn with_content(mut self, text: impl Into<String>) -> Self {
        self.content_contains = Some(text.into());
        self
    }

    pub fn within(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.time_range = Some((start.min(end), start.max(end)));
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Whether a neuron satisfies every set criterion (limit excluded)
    pub fn matches(&self, neuron: &Neuron) -> bool {
        if let Some(t) = self.neuron_type {
            if neuron.neuron_type != t {
                return false;
            }
        }
        if let Some(ref needle) = self.content_contains {
            if !neuron
                .content
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        if let Some((start, end)) = self.time_range {
            if neuron.created_at < start || neuron.created_at > end {
                return false;
            }
        }
        true
    }
}

/// Criteria for `GraphStore::get_synapses`
#[derive(Debug, Clone, Default)]
pub struct SynapseQuery {
    pub source_id: Option<Uuid>,
    pub target_id: Option<Uuid>,
    pub synapse_type: Option<SynapseType>,
    pub min_weight: Option<f32>,
}

impl SynapseQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_source(mut self, source_id: Uuid) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn to_target(mut self, target_id: Uuid) -> Self {
        self.target_id = Some(target_id);
        self
    }

    pub fn with_type(mut self, synapse_type: SynapseType) -> Self {
        self.synapse_type = Some(synapse_type);
        self
    }

    pub fn with_min_weight(mut self, min_weight: f32) -> Self {
        self.min_weight = Some(min_weight);
        self
    }

    pub fn matches(&self, synapse: &Synapse) -> bool {
        self.source_id.is_none_or(|id| synapse.source_id == id)
            && self.target_id.is_none_or(|id| synapse.target_id == id)
            && self.synapse_type.is_none_or(|t| synapse.synapse_type == t)
            && self.min_weight.is_none_or(|w| synapse.weight >= w)
    }
}

/// Criteria for `GraphStore::find_fibers`
#[derive(Debug, Clone)]
pub struct FiberQuery {
    pub contains_neuron: Option<Uuid>,
    pub time_overlaps: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Fiber must carry every listed tag (auto or agent)
    pub tags: Option<Vec<String>>,
    pub min_salience: Option<f32>,
    pub limit: usize,
}

impl Default for FiberQuery {
    fn default() -> Self {
        Self {
            contains_neuron: None,
            time_overlaps: None,
            tags: None,
            min_salience: None,
            limit: DEFAULT_QUERY_LIMIT,
        }
    }
}

impl FiberQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn containing(mut self, neuron_id: Uuid) -> Self {
        self.contains_neuron = Some(neuron_id);
        self
    }

    pub fn overlapping(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.time_overlaps = Some((start.min(end), start.max(end)));
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn with_min_salience(mut self, min_salience: f32) -> Self {
        self.min_salience = Some(min_salience);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, fiber: &Fiber) -> bool {
        if let Some(id) = self.contains_neuron {
            if !fiber.contains(id) {
                return false;
            }
        }
        if let Some((start, end)) = self.time_overlaps {
            if !fiber.time_overlaps(start, end) {
                return false;
            }
        }
        if let Some(ref tags) = self.tags {
            let fiber_tags = fiber.tags();
            if !tags.iter().all(|t| fiber_tags.contains(t)) {
                return false;
            }
        }
        if let Some(min) = self.min_salience {
            if fiber.salience < min {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_empty_neuron_query_matches_everything() {
        let query = NeuronQuery::new();
        assert!(query.matches(&Neuron::new(NeuronType::Concept, "anything")));
        assert_eq!(query.limit, DEFAULT_QUERY_LIMIT);
    }

    #[test]
    fn test_neuron_query_content_is_case_insensitive() {
        let query = NeuronQuery::new().with_content("ALICE");
        assert!(query.matches(&Neuron::new(NeuronType::Entity, "alice smith")));
        assert!(!query.matches(&Neuron::new(NeuronType::Entity, "bob")));
    }

    #[test]
    fn test_neuron_query_type_and_time() {
        let now = Utc::now();
        let query = NeuronQuery::new()
            .with_type(NeuronType::Time)
            .within(now - Duration::hours(1), now + Duration::hours(1));
        let inside = Neuron::new(NeuronType::Time, "this morning").with_created_at(now);
        let outside = inside.with_created_at(now - Duration::days(2));
        let wrong_type = Neuron::new(NeuronType::Entity, "this morning").with_created_at(now);
        assert!(query.matches(&inside));
        assert!(!query.matches(&outside));
        assert!(!query.matches(&wrong_type));
    }

    #[test]
    fn test_synapse_query_combines_criteria() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let s = Synapse::new(a, b, SynapseType::CausedBy, 0.4);
        assert!(SynapseQuery::new().from_source(a).matches(&s));
        assert!(!SynapseQuery::new().from_source(b).matches(&s));
        assert!(!SynapseQuery::new().with_min_weight(0.5).matches(&s));
        assert!(
            SynapseQuery::new()
                .to_target(b)
                .with_type(SynapseType::CausedBy)
                .matches(&s)
        );
    }

    #[test]
    fn test_fiber_query_tags_and_salience() {
        let anchor = Uuid::new_v4();
        let fiber = Fiber::new(vec![anchor], Vec::new(), anchor)
            .with_auto_tags(["rust"])
            .with_agent_tags(["work"])
            .with_salience(0.6);
        assert!(
            FiberQuery::new()
                .containing(anchor)
                .with_tags(vec!["rust".to_string(), "work".to_string()])
                .matches(&fiber)
        );
        assert!(!FiberQuery::new().with_min_salience(0.7).matches(&fiber));
        assert!(!FiberQuery::new().containing(Uuid::new_v4()).matches(&fiber));
    }
}
