//! Hebbian learning rule for synapse weights
//!
//! Pure functions computing weight changes from usage. Nothing here touches
//! storage: callers (encoder, consolidation) persist the returned synapses.
//!
//! The rule combines three effects:
//! - Joint activation: no change unless both ends are active
//! - Saturation: the `(weight_max - w)` headroom term makes growth asymptotic
//! - Novelty: young synapses learn up to `novelty_boost_max + 1` times faster

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::graph::Synapse;

/// Configuration for weight update parameters
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LearningConfig {
    /// Base learning rate (default: 0.05)
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    /// Upper bound for any synapse weight (default: 1.0)
    #[serde(default = "default_weight_max")]
    pub weight_max: f32,
    /// Extra rate multiplier for brand new synapses (default: 3.0)
    #[serde(default = "default_novelty_boost_max")]
    pub novelty_boost_max: f32,
    /// How fast the novelty boost fades per reinforcement (default: 0.06)
    #[serde(default = "default_novelty_decay")]
    pub novelty_decay: f32,
    /// Headroom below which a synapse is reported as saturated (default: 0.05)
    #[serde(default = "default_saturation_headroom")]
    pub saturation_headroom: f32,
    /// Maximum total outgoing weight per neuron (default: 5.0)
    #[serde(default = "default_weight_budget")]
    pub weight_budget: f32,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            weight_max: default_weight_max(),
            novelty_boost_max: default_novelty_boost_max(),
            novelty_decay: default_novelty_decay(),
            saturation_headroom: default_saturation_headroom(),
            weight_budget: default_weight_budget(),
        }
    }
}

fn default_learning_rate() -> f32 {
    0.05
}

fn default_weight_max() -> f32 {
    1.0
}

fn default_novelty_boost_max() -> f32 {
    3.0
}

fn default_novelty_decay() -> f32 {
    0.06
}

fn default_saturation_headroom() -> f32 {
    0.05
}

fn default_weight_budget() -> f32 {
    5.0
}

/// Outcome of a single weight update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightUpdate {
    pub old_weight: f32,
    pub new_weight: f32,
    pub delta: f32,
    /// Learning rate actually applied after the novelty boost
    pub effective_rate: f32,
    /// Remaining headroom is below `saturation_headroom`
    pub saturated: bool,
}

impl WeightUpdate {
    fn unchanged(weight: f32, effective_rate: f32, saturated: bool) -> Self {
        Self {
            old_weight: weight,
            new_weight: weight,
            delta: 0.0,
            effective_rate,
            saturated,
        }
    }
}

/// Learning rate after the novelty boost.
///
/// Formula: base_rate * (1 + novelty_boost_max * exp(-novelty_decay * reinforced_count))
///
/// Non-increasing in `reinforced_count`, approaching `base_rate` with use.
pub fn effective_rate(
    base_rate: f32,
    reinforced_count: u32,
    novelty_boost_max: f32,
    novelty_decay: f32,
) -> f32 {
    let base_rate = base_rate.max(0.0);
    let boost = novelty_boost_max.max(0.0);
    let decay = novelty_decay.max(0.0);
    base_rate * (1.0 + boost * (-decay * reinforced_count as f32).exp())
}

/// Hebbian reinforcement for a synapse whose ends fired together.
///
/// Returns the weight unchanged when either activation is zero or negative.
/// The result always lies in `[w, weight_max]` for `w` within bounds.
pub fn hebbian_update(
    weight: f32,
    pre_activation: f32,
    post_activation: f32,
    reinforced_count: u32,
    config: &LearningConfig,
) -> WeightUpdate {
    let weight_max = config.weight_max.max(0.0);
    let weight = sanitize(weight).clamp(0.0, weight_max);
    let rate = effective_rate(
        config.learning_rate,
        reinforced_count,
        config.novelty_boost_max,
        config.novelty_decay,
    );
    let headroom = weight_max - weight;
    let saturated = headroom < config.saturation_headroom;

    let pre = sanitize(pre_activation).min(1.0);
    let post = sanitize(post_activation).min(1.0);
    if pre <= 0.0 || post <= 0.0 {
        return WeightUpdate::unchanged(weight, rate, saturated);
    }

    let delta = rate * pre * post * headroom;
    let new_weight = (weight + delta).clamp(0.0, weight_max);

    WeightUpdate {
        old_weight: weight,
        new_weight,
        delta: new_weight - weight,
        effective_rate: rate,
        saturated,
    }
}

/// Anti-Hebbian weakening for contradicting or conflicting evidence.
///
/// Formula: delta = -learning_rate * conflict_strength * w, floored at 0.
pub fn anti_hebbian_update(
    weight: f32,
    conflict_strength: f32,
    config: &LearningConfig,
) -> WeightUpdate {
    let weight_max = config.weight_max.max(0.0);
    let weight = sanitize(weight).clamp(0.0, weight_max);
    let conflict = sanitize(conflict_strength).min(1.0);
    let rate = config.learning_rate.max(0.0);

    let delta = -rate * conflict * weight;
    let new_weight = (weight + delta).max(0.0);

    WeightUpdate {
        old_weight: weight,
        new_weight,
        delta: new_weight - weight,
        effective_rate: rate,
        saturated: weight_max - new_weight < config.saturation_headroom,
    }
}

/// Competitive normalization of a neuron's outgoing weights.
///
/// When the outgoing weights of `source_id` sum past `budget`, every one of
/// them is scaled by `budget / total`. Below the budget, and for synapses not
/// leaving `source_id`, values are returned untouched.
pub fn normalize_outgoing_weights(synapses: &[Synapse], source_id: Uuid, budget: f32) -> Vec<Synapse> {
    let budget = sanitize(budget);
    let total: f32 = synapses
        .iter()
        .filter(|s| s.source_id == source_id)
        .map(|s| s.weight)
        .sum();

    if total <= budget || total <= 0.0 {
        return synapses.to_vec();
    }

    let scale = budget / total;
    synapses
        .iter()
        .map(|s| {
            if s.source_id == source_id {
                s.with_weight(s.weight * scale)
            } else {
                s.clone()
            }
        })
        .collect()
}

/// Apply a Hebbian update to a synapse and record the reinforcement.
///
/// The reinforcement count and timestamp advance only when the weight update
/// was actually applied (both ends active).
pub fn reinforce_synapse(
    synapse: &Synapse,
    pre_activation: f32,
    post_activation: f32,
    now: DateTime<Utc>,
    config: &LearningConfig,
) -> (Synapse, WeightUpdate) {
    let update = hebbian_update(
        synapse.weight,
        pre_activation,
        post_activation,
        synapse.reinforced_count,
        config,
    );
    if sanitize(pre_activation) <= 0.0 || sanitize(post_activation) <= 0.0 {
        return (synapse.clone(), update);
    }
    (synapse.reinforce(update.delta, now), update)
}

fn sanitize(value: f32) -> f32 {
    if value.is_nan() { 0.0 } else { value.max(0.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SynapseType;

    #[test]
    fn test_learning_config_default() {
        let config = LearningConfig::default();
        assert_eq!(config.learning_rate, 0.05);
        assert_eq!(config.weight_max, 1.0);
        assert_eq!(config.novelty_boost_max, 3.0);
        assert_eq!(config.novelty_decay, 0.06);
        assert_eq!(config.weight_budget, 5.0);
    }

    #[test]
    fn test_effective_rate_new_synapse() {
        let rate = effective_rate(0.05, 0, 3.0, 0.06);
        assert!((rate - 0.2).abs() < 1e-6, "fresh synapse should learn 4x, got {rate}");
    }

    #[test]
    fn test_effective_rate_habituates() {
        let rate = effective_rate(0.05, 1000, 3.0, 0.06);
        assert!((rate - 0.05).abs() < 1e-4);
    }

    #[test]
    fn test_hebbian_update_formula() {
        let config = LearningConfig::default();
        let update = hebbian_update(0.5, 1.0, 1.0, 0, &config);
        // rate 0.2 * 1 * 1 * headroom 0.5
        assert!((update.delta - 0.1).abs() < 1e-6);
        assert!((update.new_weight - 0.6).abs() < 1e-6);
        assert!(!update.saturated);
    }

    #[test]
    fn test_hebbian_update_saturation_flag() {
        let config = LearningConfig::default();
        let update = hebbian_update(0.98, 1.0, 1.0, 0, &config);
        assert!(update.saturated);
        assert!(update.new_weight <= 1.0);
    }

    #[test]
    fn test_anti_hebbian_update() {
        let config = LearningConfig::default();
        let update = anti_hebbian_update(0.8, 1.0, &config);
        assert!((update.new_weight - 0.76).abs() < 1e-6);
        assert!(update.delta < 0.0);

        let zero = anti_hebbian_update(0.0, 1.0, &config);
        assert_eq!(zero.new_weight, 0.0);
    }

    #[test]
    fn test_reinforce_synapse_requires_joint_activation() {
        let config = LearningConfig::default();
        let now = Utc::now();
        let synapse = Synapse::new(Uuid::new_v4(), Uuid::new_v4(), SynapseType::LeadsTo, 0.4);

        let (unchanged, _) = reinforce_synapse(&synapse, 0.0, 0.9, now, &config);
        assert_eq!(unchanged, synapse);

        let (reinforced, update) = reinforce_synapse(&synapse, 0.9, 0.9, now, &config);
        assert_eq!(reinforced.reinforced_count, 1);
        assert!((reinforced.weight - update.new_weight).abs() < 1e-6);
        assert!(reinforced.weight > synapse.weight);
    }

    #[test]
    fn test_reinforce_synapse_ignores_nan_activation() {
        let config = LearningConfig::default();
        let now = Utc::now();
        let synapse = Synapse::new(Uuid::new_v4(), Uuid::new_v4(), SynapseType::LeadsTo, 0.4);

        let (after_pre, update) = reinforce_synapse(&synapse, f32::NAN, 0.9, now, &config);
        assert_eq!(after_pre, synapse);
        assert_eq!(after_pre.reinforced_count, 0);
        assert_eq!(update.delta, 0.0);

        let (after_post, _) = reinforce_synapse(&synapse, 0.9, f32::NAN, now, &config);
        assert_eq!(after_post, synapse);
    }
}
