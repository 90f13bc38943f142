//! Synapse type: a typed, weighted edge between two neurons

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::neuron::clamp_unit;

/// Relation carried by a synapse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynapseType {
    RelatedTo,
    CausedBy,
    LeadsTo,
    Involves,
    HappenedAt,
    AtLocation,
    Before,
    Contradicts,
    SimilarTo,
    CoOccurs,
    Felt,
    Enables,
}

impl SynapseType {
    /// Relations that read the same from either end
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self,
            SynapseType::RelatedTo
                | SynapseType::SimilarTo
                | SynapseType::CoOccurs
                | SynapseType::Contradicts
        )
    }
}

/// Whether a synapse can be traversed from its target back to its source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Unidirectional,
    Bidirectional,
}

/// A weighted edge in the memory graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synapse {
    pub id: Uuid,
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub synapse_type: SynapseType,
    /// Connection strength in [0, 1]
    pub weight: f32,
    pub direction: Direction,
    pub metadata: HashMap<String, serde_json::Value>,
    /// Number of reinforcements applied, never decreases
    pub reinforced_count: u32,
    pub last_activated: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Synapse {
    /// Create a synapse; symmetric relation types are bidirectional.
    pub fn new(source_id: Uuid, target_id: Uuid, synapse_type: SynapseType, weight: f32) -> Self {
        let direction = if synapse_type.is_symmetric() {
            Direction::Bidirectional
        } else {
            Direction::Unidirectional
        };
        Self {
            id: Uuid::new_v4(),
            source_id,
            target_id,
            synapse_type,
            weight: clamp_unit(weight),
            direction,
            metadata: HashMap::new(),
            reinforced_count: 0,
            last_activated: None,
            created_at: Utc::now(),
        }
    }

    /// Copy with an explicit direction
    pub fn with_direction(&self, direction: Direction) -> Self {
        Self {
            direction,
            ..self.clone()
        }
    }

    /// Copy with a new (clamped) weight
    pub fn with_weight(&self, weight: f32) -> Self {
        Self {
            weight: clamp_unit(weight),
            ..self.clone()
        }
    }

    /// Copy with an additional metadata entry
    pub fn with_metadata(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut next = self.clone();
        next.metadata.insert(key.into(), value);
        next
    }

    /// Apply a weight delta, bump the reinforcement count and stamp the time
    pub fn reinforce(&self, delta: f32, now: DateTime<Utc>) -> Self {
        Self {
            weight: clamp_unit(self.weight + delta),
            reinforced_count: self.reinforced_count.saturating_add(1),
            last_activated: Some(now),
            ..self.clone()
        }
    }

    pub fn is_bidirectional(&self) -> bool {
        self.direction == Direction::Bidirectional
    }

    /// Whether this synapse touches the neuron
    pub fn connects(&self, neuron_id: Uuid) -> bool {
        self.source_id == neuron_id || self.target_id == neuron_id
    }

    /// The neuron on the other side of `neuron_id`, if it is an endpoint
    pub fn other_end(&self, neuron_id: Uuid) -> Option<Uuid> {
        if self.source_id == neuron_id {
            Some(self.target_id)
        } else if self.target_id == neuron_id {
            Some(self.source_id)
        } else {
            None
        }
    }
}
