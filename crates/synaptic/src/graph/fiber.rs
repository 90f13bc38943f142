//! Fiber type: a coherent memory unit with an ordered neuron pathway

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::neuron::clamp_unit;

/// Conductivity gained each time a fiber is traversed
const CONDUCTION_GAIN: f32 = 0.02;

/// A cluster of neurons and synapses encoding one memory.
///
/// `neuron_ids` always contains `anchor_neuron_id`, and every id in `pathway`
/// is also in `neuron_ids`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fiber {
    pub id: Uuid,
    pub neuron_ids: HashSet<Uuid>,
    pub synapse_ids: HashSet<Uuid>,
    pub anchor_neuron_id: Uuid,
    /// Ordered walk through the memory; position matters for reflex traversal
    pub pathway: Vec<Uuid>,
    pub time_start: Option<DateTime<Utc>>,
    pub time_end: Option<DateTime<Utc>>,
    pub coherence: f32,
    pub salience: f32,
    /// Number of times the fiber has been conducted
    pub frequency: u32,
    /// How well activation travels along the pathway, in [0, 1]
    pub conductivity: f32,
    pub last_conducted: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    /// Tags assigned by the encoder
    pub auto_tags: BTreeSet<String>,
    /// Tags assigned by the agent
    pub agent_tags: BTreeSet<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl Fiber {
    /// Create a fiber around an anchor; the anchor is added to `neuron_ids`.
    pub fn new(
        neuron_ids: impl IntoIterator<Item = Uuid>,
        synapse_ids: impl IntoIterator<Item = Uuid>,
        anchor_neuron_id: Uuid,
    ) -> Self {
        let mut neuron_ids: HashSet<Uuid> = neuron_ids.into_iter().collect();
        neuron_ids.insert(anchor_neuron_id);
        Self {
            id: Uuid::new_v4(),
            neuron_ids,
            synapse_ids: synapse_ids.into_iter().collect(),
            anchor_neuron_id,
            pathway: Vec::new(),
            time_start: None,
            time_end: None,
            coherence: 0.0,
            salience: 0.0,
            frequency: 0,
            conductivity: 1.0,
            last_conducted: None,
            summary: None,
            auto_tags: BTreeSet::new(),
            agent_tags: BTreeSet::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Copy with a pathway. Pathway neurons missing from `neuron_ids` are added.
    pub fn with_pathway(&self, pathway: Vec<Uuid>) -> Self {
        let mut next = self.clone();
        next.neuron_ids.extend(pathway.iter().copied());
        next.pathway = pathway;
        next
    }

    pub fn with_summary(&self, summary: impl Into<String>) -> Self {
        Self {
            summary: Some(summary.into()),
            ..self.clone()
        }
    }

    pub fn with_salience(&self, salience: f32) -> Self {
        Self {
            salience: clamp_unit(salience),
            ..self.clone()
        }
    }

    pub fn with_coherence(&self, coherence: f32) -> Self {
        Self {
            coherence: clamp_unit(coherence),
            ..self.clone()
        }
    }

    pub fn with_conductivity(&self, conductivity: f32) -> Self {
        Self {
            conductivity: clamp_unit(conductivity),
            ..self.clone()
        }
    }

    pub fn with_time_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            time_start: Some(start.min(end)),
            time_end: Some(start.max(end)),
            ..self.clone()
        }
    }

    pub fn with_last_conducted(&self, at: DateTime<Utc>) -> Self {
        Self {
            last_conducted: Some(at),
            ..self.clone()
        }
    }

    pub fn with_auto_tags<I, S>(&self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.auto_tags.extend(tags.into_iter().map(Into::into));
        next
    }

    pub fn with_agent_tags<I, S>(&self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.agent_tags.extend(tags.into_iter().map(Into::into));
        next
    }

    /// Record a traversal: frequency, timestamp and a small conductivity gain
    pub fn conduct(&self, now: DateTime<Utc>) -> Self {
        Self {
            frequency: self.frequency.saturating_add(1),
            last_conducted: Some(now),
            conductivity: clamp_unit(self.conductivity + CONDUCTION_GAIN),
            ..self.clone()
        }
    }

    /// Union of auto and agent tags
    pub fn tags(&self) -> BTreeSet<String> {
        self.auto_tags.union(&self.agent_tags).cloned().collect()
    }

    pub fn contains(&self, neuron_id: Uuid) -> bool {
        self.neuron_ids.contains(&neuron_id)
    }

    /// Index of the neuron within the pathway
    pub fn pathway_position(&self, neuron_id: Uuid) -> Option<usize> {
        self.pathway.iter().position(|id| *id == neuron_id)
    }

    /// Whether the fiber's time span intersects `[start, end]`.
    ///
    /// Fibers without a time span never overlap.
    pub fn time_overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        match (self.time_start, self.time_end) {
            (Some(s), Some(e)) => s <= end && e >= start,
            (Some(s), None) => s >= start && s <= end,
            (None, Some(e)) => e >= start && e <= end,
            (None, None) => false,
        }
    }

    /// Reference instant for recency: last conduction, else creation
    pub fn last_active(&self) -> DateTime<Utc> {
        self.last_conducted.unwrap_or(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_includes_anchor() {
        let anchor = Uuid::new_v4();
        let fiber = Fiber::new(Vec::new(), Vec::new(), anchor);
        assert!(fiber.contains(anchor));
        assert_eq!(fiber.conductivity, 1.0);
    }

    #[test]
    fn test_with_pathway_keeps_subset_invariant() {
        let anchor = Uuid::new_v4();
        let other = Uuid::new_v4();
        let fiber = Fiber::new(vec![anchor], Vec::new(), anchor).with_pathway(vec![anchor, other]);
        assert!(fiber.contains(other));
        assert_eq!(fiber.pathway_position(other), Some(1));
        assert_eq!(fiber.pathway_position(Uuid::new_v4()), None);
    }

    #[test]
    fn test_tags_union() {
        let fiber = Fiber::new(Vec::new(), Vec::new(), Uuid::new_v4())
            .with_auto_tags(["rust", "memory"])
            .with_agent_tags(["memory", "work"]);
        let tags: Vec<_> = fiber.tags().into_iter().collect();
        assert_eq!(tags, vec!["memory", "rust", "work"]);
    }

    #[test]
    fn test_conduct_updates_usage() {
        let now = Utc::now();
        let fiber = Fiber::new(Vec::new(), Vec::new(), Uuid::new_v4()).with_conductivity(0.5);
        let conducted = fiber.conduct(now);
        assert_eq!(conducted.frequency, 1);
        assert_eq!(conducted.last_conducted, Some(now));
        assert!(conducted.conductivity > 0.5);
        assert_eq!(conducted.last_active(), now);
    }

    #[test]
    fn test_conduct_caps_conductivity() {
        let fiber = Fiber::new(Vec::new(), Vec::new(), Uuid::new_v4());
        assert_eq!(fiber.conduct(Utc::now()).conductivity, 1.0);
    }

    #[test]
    fn test_time_overlaps() {
        let now = Utc::now();
        let fiber = Fiber::new(Vec::new(), Vec::new(), Uuid::new_v4())
            .with_time_range(now - Duration::hours(2), now - Duration::hours(1));
        assert!(fiber.time_overlaps(now - Duration::hours(3), now - Duration::minutes(90)));
        assert!(!fiber.time_overlaps(now - Duration::minutes(30), now));

        let untimed = Fiber::new(Vec::new(), Vec::new(), Uuid::new_v4());
        assert!(!untimed.time_overlaps(now - Duration::days(1), now));
    }
}
