//! Reflex (trail) activation along fiber pathways
//!
//! Full spreading activation touches a large part of the graph per query,
//! while most answers sit on pathways fibers already recorded. Reflex
//! activation only walks those pathways: from an anchor's position it moves
//! outward in both directions, decaying by the fiber's conductivity and
//! recency rather than by per-synapse weights.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::activation::{ActivationMap, ActivationResult, merge_activation_sets};
use crate::graph::Fiber;

/// Hours after which a fiber's time factor bottoms out (one week)
const TIME_FACTOR_HORIZON_HOURS: f32 = 168.0;

/// Lowest time factor an old fiber can have
const TIME_FACTOR_FLOOR: f32 = 0.1;

/// Configuration for reflex activation
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ReflexConfig {
    /// Fraction of activation lost per pathway step (default: 0.15)
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
    /// Walking stops once the level falls below this (default: 0.1)
    #[serde(default = "default_activation_threshold")]
    pub activation_threshold: f32,
    /// Snapshots closer than this count as firing together (default: 500)
    #[serde(default = "default_co_activation_window_ms")]
    pub co_activation_window_ms: i64,
}

impl Default for ReflexConfig {
    fn default() -> Self {
        Self {
            decay_rate: default_decay_rate(),
            activation_threshold: default_activation_threshold(),
            co_activation_window_ms: default_co_activation_window_ms(),
        }
    }
}

fn default_decay_rate() -> f32 {
    0.15
}

fn default_activation_threshold() -> f32 {
    0.1
}

fn default_co_activation_window_ms() -> i64 {
    500
}

/// Activations produced by one anchor set at one instant
#[derive(Debug, Clone)]
pub struct ActivationSnapshot {
    pub fired_at: DateTime<Utc>,
    pub activations: ActivationMap,
}

/// A neuron activated by several independent anchor sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoActivation {
    pub neuron_id: Uuid,
    /// Fraction of snapshots that activated the neuron
    pub binding_strength: f32,
    /// Number of snapshots that activated the neuron
    pub set_count: usize,
    /// Anchors whose activation reached the neuron, sorted
    pub source_anchors: Vec<Uuid>,
    /// Sum of the neuron's levels across matching snapshots
    pub combined_level: f32,
}

/// Output of `activate_with_co_binding`
#[derive(Debug, Clone, Default)]
pub struct CoBindingResult {
    pub activations: ActivationMap,
    pub intersection_ids: Vec<Uuid>,
    pub co_activations: Vec<CoActivation>,
}

/// Recency factor of a fiber: `max(0.1, 1 - age_hours / 168)`
pub fn time_factor(fiber: &Fiber, reference_time: DateTime<Utc>) -> f32 {
    let age_ms = (reference_time - fiber.last_active()).num_milliseconds().max(0);
    let age_hours = age_ms as f32 / 3_600_000.0;
    (1.0 - age_hours / TIME_FACTOR_HORIZON_HOURS).max(TIME_FACTOR_FLOOR)
}

/// Trail activation engine. Pure: callers supply the fibers.
#[derive(Debug, Clone, Default)]
pub struct ReflexActivation {
    config: ReflexConfig,
}

impl ReflexActivation {
    pub fn new(config: ReflexConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReflexConfig {
        &self.config
    }

    /// Walk every fiber pathway containing an anchor, in both directions.
    ///
    /// Each step multiplies the level by
    /// `(1 - decay_rate) * conductivity * time_factor`. Only the best level
    /// per neuron is kept across anchors and fibers.
    pub fn activate_trail(
        &self,
        anchor_ids: &[Uuid],
        fibers: &[Fiber],
        reference_time: DateTime<Utc>,
    ) -> ActivationMap {
        let mut results = ActivationMap::new();
        let step_retention = (1.0 - self.config.decay_rate).clamp(0.0, 1.0);
        let threshold = self.config.activation_threshold;

        for &anchor in anchor_ids {
            results
                .entry(anchor)
                .or_insert_with(|| ActivationResult::anchor(anchor));
        }

        for fiber in fibers {
            let step_factor = step_retention
                * fiber.conductivity.clamp(0.0, 1.0)
                * time_factor(fiber, reference_time);

            for &anchor in anchor_ids {
                let Some(start) = fiber.pathway_position(anchor) else {
                    continue;
                };

                let forward = fiber.pathway[start + 1..].iter();
                let backward = fiber.pathway[..start].iter().rev();
                walk(&mut results, anchor, forward, step_factor, threshold);
                walk(&mut results, anchor, backward, step_factor, threshold);
            }
        }

        debug!(
            anchors = anchor_ids.len(),
            fibers = fibers.len(),
            activated = results.len(),
            "Trail activation complete"
        );
        results
    }

    /// Neurons present in at least two snapshots fired within the window.
    ///
    /// `binding_strength` is the matching snapshot count over the total
    /// number of snapshots. Sorted by strength, then combined level.
    pub fn find_co_activated(
        &self,
        snapshots: &[ActivationSnapshot],
        temporal_window_ms: i64,
    ) -> Vec<CoActivation> {
        if snapshots.len() < 2 {
            return Vec::new();
        }
        let total = snapshots.len() as f32;

        let mut hits: HashMap<Uuid, Vec<(DateTime<Utc>, &ActivationResult)>> = HashMap::new();
        for snapshot in snapshots {
            for (id, result) in &snapshot.activations {
                hits.entry(*id)
                    .or_default()
                    .push((snapshot.fired_at, result));
            }
        }

        let mut co_activations: Vec<CoActivation> = hits
            .into_iter()
            .filter_map(|(neuron_id, mut fired)| {
                fired.sort_by_key(|(at, _)| *at);
                let group = densest_window(&fired, temporal_window_ms.max(0));
                if group.len() < 2 {
                    return None;
                }
                let mut source_anchors: Vec<Uuid> =
                    group.iter().map(|(_, r)| r.source_anchor).collect();
                source_anchors.sort();
                source_anchors.dedup();
                Some(CoActivation {
                    neuron_id,
                    binding_strength: group.len() as f32 / total,
                    set_count: group.len(),
                    source_anchors,
                    combined_level: group.iter().map(|(_, r)| r.level).sum(),
                })
            })
            .collect();

        co_activations.sort_by(|a, b| {
            b.binding_strength
                .total_cmp(&a.binding_strength)
                .then_with(|| b.combined_level.total_cmp(&a.combined_level))
                .then_with(|| a.neuron_id.cmp(&b.neuron_id))
        });
        co_activations
    }

    /// Trail activation per anchor set, merged with intersection boosting,
    /// plus the co-activations between sets.
    pub fn activate_with_co_binding(
        &self,
        anchor_sets: &[Vec<Uuid>],
        fibers: &[Fiber],
        reference_time: DateTime<Utc>,
    ) -> CoBindingResult {
        let snapshots: Vec<ActivationSnapshot> = anchor_sets
            .iter()
            .filter(|set| !set.is_empty())
            .map(|set| ActivationSnapshot {
                fired_at: reference_time,
                activations: self.activate_trail(set, fibers, reference_time),
            })
            .collect();

        let maps: Vec<ActivationMap> = snapshots.iter().map(|s| s.activations.clone()).collect();
        let (activations, intersection_ids) = merge_activation_sets(&maps);
        let co_activations =
            self.find_co_activated(&snapshots, self.config.co_activation_window_ms);

        debug!(
            sets = snapshots.len(),
            intersections = intersection_ids.len(),
            co_activations = co_activations.len(),
            "Co-binding activation complete"
        );

        CoBindingResult {
            activations,
            intersection_ids,
            co_activations,
        }
    }
}

fn walk<'p>(
    results: &mut ActivationMap,
    anchor: Uuid,
    steps: impl Iterator<Item = &'p Uuid>,
    step_factor: f32,
    threshold: f32,
) {
    let mut level = 1.0_f32;
    let mut path = vec![anchor];
    for (hop, &neuron_id) in steps.enumerate() {
        level *= step_factor;
        if level < threshold || level <= 0.0 {
            break;
        }
        path.push(neuron_id);
        let improves = results
            .get(&neuron_id)
            .is_none_or(|existing| level > existing.level);
        if improves {
            results.insert(
                neuron_id,
                ActivationResult {
                    neuron_id,
                    level: level.min(1.0),
                    hop_distance: hop + 1,
                    path: path.clone(),
                    source_anchor: anchor,
                },
            );
        }
    }
}

/// Largest group of time-sorted hits that fit in one window
fn densest_window<'r>(
    fired: &[(DateTime<Utc>, &'r ActivationResult)],
    window_ms: i64,
) -> Vec<(DateTime<Utc>, &'r ActivationResult)> {
    let mut best: &[(DateTime<Utc>, &ActivationResult)] = &[];
    let mut start = 0;
    for end in 0..fired.len() {
        while (fired[end].0 - fired[start].0).num_milliseconds() > window_ms {
            start += 1;
        }
        if end + 1 - start > best.len() {
            best = &fired[start..=end];
        }
    }
    best.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fiber_with_path(path: &[Uuid], conducted: DateTime<Utc>) -> Fiber {
        Fiber::new(path.iter().copied(), Vec::new(), path[0])
            .with_pathway(path.to_vec())
            .with_last_conducted(conducted)
    }

    #[test]
    fn test_reflex_config_default() {
        let config = ReflexConfig::default();
        assert_eq!(config.decay_rate, 0.15);
        assert_eq!(config.activation_threshold, 0.1);
        assert_eq!(config.co_activation_window_ms, 500);
    }

    #[test]
    fn test_time_factor_recent_and_old() {
        let now = Utc::now();
        let anchor = Uuid::new_v4();
        let fresh = fiber_with_path(&[anchor], now);
        let old = fiber_with_path(&[anchor], now - Duration::days(30));
        assert!((time_factor(&fresh, now) - 1.0).abs() < 1e-6);
        assert!((time_factor(&old, now) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_trail_walks_both_directions() {
        let now = Utc::now();
        let ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let fiber = fiber_with_path(&ids, now);
        let engine = ReflexActivation::default();

        let result = engine.activate_trail(&[ids[2]], &[fiber], now);
        assert_eq!(result[&ids[2]].level, 1.0);
        assert!((result[&ids[1]].level - 0.85).abs() < 1e-5);
        assert!((result[&ids[3]].level - 0.85).abs() < 1e-5);
        assert!((result[&ids[4]].level - 0.7225).abs() < 1e-5);
        assert_eq!(result[&ids[0]].hop_distance, 2);
        assert_eq!(result[&ids[0]].path, vec![ids[2], ids[1], ids[0]]);
    }

    #[test]
    fn test_trail_stops_below_threshold() {
        let now = Utc::now();
        let ids: Vec<Uuid> = (0..30).map(|_| Uuid::new_v4()).collect();
        let fiber = fiber_with_path(&ids, now).with_conductivity(0.5);
        let engine = ReflexActivation::default();

        let result = engine.activate_trail(&[ids[0]], &[fiber], now);
        assert!(result.len() < ids.len());
        for r in result.values() {
            assert!(r.level <= 1.0);
            assert!(r.level >= 0.1);
        }
    }

    #[test]
    fn test_trail_ignores_fibers_without_anchor() {
        let now = Utc::now();
        let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        let fiber = fiber_with_path(&ids, now);
        let stranger = Uuid::new_v4();
        let result = ReflexActivation::default().activate_trail(&[stranger], &[fiber], now);
        assert_eq!(result.len(), 1);
        assert!(result.contains_key(&stranger));
    }

    #[test]
    fn test_co_activation_requires_two_sets() {
        let now = Utc::now();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let shared = Uuid::new_v4();
        let f1 = fiber_with_path(&[a, shared], now);
        let f2 = fiber_with_path(&[b, shared], now);
        let engine = ReflexActivation::default();

        let result = engine.activate_with_co_binding(&[vec![a], vec![b]], &[f1, f2], now);
        assert_eq!(result.intersection_ids, vec![shared]);
        assert_eq!(result.co_activations.len(), 1);
        let co = &result.co_activations[0];
        assert_eq!(co.neuron_id, shared);
        assert_eq!(co.set_count, 2);
        assert!((co.binding_strength - 1.0).abs() < 1e-6);
        assert_eq!(co.source_anchors.len(), 2);
    }

    #[test]
    fn test_co_activation_respects_window() {
        let now = Utc::now();
        let shared = Uuid::new_v4();
        let snapshot = |at: DateTime<Utc>| ActivationSnapshot {
            fired_at: at,
            activations: [(shared, ActivationResult::anchor(shared))]
                .into_iter()
                .collect(),
        };
        let engine = ReflexActivation::default();

        let far = [snapshot(now), snapshot(now + Duration::seconds(5))];
        assert!(engine.find_co_activated(&far, 500).is_empty());

        let near = [snapshot(now), snapshot(now + Duration::milliseconds(100))];
        assert_eq!(engine.find_co_activated(&near, 500).len(), 1);
    }
}
