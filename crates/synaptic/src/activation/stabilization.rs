//! Iterative stabilization of a raw activation map
//!
//! Each iteration removes noise, dampens every level by a fixed factor and
//! then applies one shared homeostatic gain that pulls the population mean
//! toward a target. Every survivor is scaled by the same positive factor,
//! capped so the strongest level never exceeds 1.0, so relative order is
//! preserved; what changes is the overall mass, so a crowd of weak
//! activations cannot drown out one strong one.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::activation::ActivationMap;

/// Bounds on the per-iteration homeostatic gain
const MIN_GAIN: f32 = 0.5;
const MAX_GAIN: f32 = 2.0;

/// Configuration for stabilization
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StabilizationConfig {
    /// Levels below this are removed (default: 0.05)
    #[serde(default = "default_noise_floor")]
    pub noise_floor: f32,
    /// Fixed multiplier applied every iteration (default: 0.85)
    #[serde(default = "default_dampening")]
    pub dampening: f32,
    /// Population mean the homeostatic gain pulls toward (default: 0.5)
    #[serde(default = "default_homeostatic_target")]
    pub homeostatic_target: f32,
    /// Strength of the pull toward the target (default: 0.5)
    #[serde(default = "default_homeostatic_gain")]
    pub homeostatic_gain: f32,
    /// Iteration cap (default: 10)
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Converged when no level moves more than this (default: 0.01)
    #[serde(default = "default_convergence_threshold")]
    pub convergence_threshold: f32,
}

impl Default for StabilizationConfig {
    fn default() -> Self {
        Self {
            noise_floor: default_noise_floor(),
            dampening: default_dampening(),
            homeostatic_target: default_homeostatic_target(),
            homeostatic_gain: default_homeostatic_gain(),
            max_iterations: default_max_iterations(),
            convergence_threshold: default_convergence_threshold(),
        }
    }
}

fn default_noise_floor() -> f32 {
    0.05
}

fn default_dampening() -> f32 {
    0.85
}

fn default_homeostatic_target() -> f32 {
    0.5
}

fn default_homeostatic_gain() -> f32 {
    0.5
}

fn default_max_iterations() -> usize {
    10
}

fn default_convergence_threshold() -> f32 {
    0.01
}

/// What happened during stabilization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StabilizationReport {
    pub iterations: usize,
    pub converged: bool,
    pub neurons_removed: usize,
    /// Largest single-neuron change in the last iteration
    pub max_delta: f32,
}

/// Stabilize an activation map.
///
/// Never fails: when `max_iterations` is reached without convergence the best
/// effort map is returned with `converged = false`.
pub fn stabilize(
    activations: &ActivationMap,
    config: &StabilizationConfig,
) -> (ActivationMap, StabilizationReport) {
    let mut current = activations.clone();
    let mut report = StabilizationReport {
        iterations: 0,
        converged: true,
        neurons_removed: 0,
        max_delta: 0.0,
    };
    if current.is_empty() {
        return (current, report);
    }

    let dampening = config.dampening.clamp(0.0, 1.0);
    report.converged = false;

    for iteration in 1..=config.max_iterations {
        report.iterations = iteration;
        report.neurons_removed += remove_noise(&mut current, config.noise_floor);
        if current.is_empty() {
            report.converged = true;
            report.max_delta = 0.0;
            break;
        }

        let mean_dampened =
            current.values().map(|r| r.level * dampening).sum::<f32>() / current.len() as f32;
        let gain = if mean_dampened > 0.0 {
            (1.0 + config.homeostatic_gain
                * (config.homeostatic_target - mean_dampened)
                / mean_dampened)
                .clamp(MIN_GAIN, MAX_GAIN)
        } else {
            1.0
        };
        // the strongest survivor must stay at or below 1.0 so no clamp ties it
        let peak = current.values().map(|r| r.level).fold(0.0_f32, f32::max) * dampening;
        let gain = if peak > 0.0 { gain.min(1.0 / peak) } else { gain };

        let mut max_delta = 0.0_f32;
        for result in current.values_mut() {
            let next = (result.level * dampening * gain).clamp(0.0, 1.0);
            max_delta = max_delta.max((next - result.level).abs());
            result.level = next;
        }
        report.max_delta = max_delta;

        if max_delta < config.convergence_threshold {
            report.converged = true;
            break;
        }
    }

    report.neurons_removed += remove_noise(&mut current, config.noise_floor);

    debug!(
        iterations = report.iterations,
        converged = report.converged,
        removed = report.neurons_removed,
        remaining = current.len(),
        "Stabilization complete"
    );
    (current, report)
}

fn remove_noise(activations: &mut ActivationMap, noise_floor: f32) -> usize {
    let before = activations.len();
    activations.retain(|_, r| r.level >= noise_floor);
    before - activations.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::{ActivationResult, ranked};
    use uuid::Uuid;

    fn map(levels: &[f32]) -> ActivationMap {
        levels
            .iter()
            .map(|level| {
                let id = Uuid::new_v4();
                let mut r = ActivationResult::anchor(id);
                r.level = *level;
                (id, r)
            })
            .collect()
    }

    #[test]
    fn test_stabilization_config_default() {
        let config = StabilizationConfig::default();
        assert_eq!(config.noise_floor, 0.05);
        assert_eq!(config.dampening, 0.85);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.convergence_threshold, 0.01);
    }

    #[test]
    fn test_empty_map_is_trivially_converged() {
        let (result, report) = stabilize(&ActivationMap::new(), &StabilizationConfig::default());
        assert!(result.is_empty());
        assert_eq!(report.iterations, 0);
        assert!(report.converged);
    }

    #[test]
    fn test_single_neuron_converges() {
        let (result, report) = stabilize(&map(&[1.0]), &StabilizationConfig::default());
        assert!(report.converged);
        assert!(report.iterations <= 10);
        assert_eq!(result.len(), 1);
        let level = result.values().next().unwrap().level;
        assert!(level > 0.3 && level < 0.6, "settled at {level}");
    }

    #[test]
    fn test_noise_removed() {
        let (result, report) = stabilize(&map(&[0.9, 0.02, 0.01]), &StabilizationConfig::default());
        assert_eq!(result.len(), 1);
        assert!(report.neurons_removed >= 2);
        assert!(result.values().all(|r| r.level >= 0.05));
    }

    #[test]
    fn test_order_preserved() {
        let input = map(&[0.9, 0.6, 0.4, 0.3, 0.2]);
        let before: Vec<Uuid> = ranked(&input).iter().map(|r| r.neuron_id).collect();
        let (result, _) = stabilize(&input, &StabilizationConfig::default());
        let after: Vec<Uuid> = ranked(&result).iter().map(|r| r.neuron_id).collect();
        let surviving: Vec<Uuid> = before.into_iter().filter(|id| result.contains_key(id)).collect();
        assert_eq!(surviving, after);
    }

    #[test]
    fn test_strict_order_kept_when_weak_crowd_pulls_gain_up() {
        let mut levels = vec![0.9, 0.7];
        levels.extend(std::iter::repeat_n(0.06, 20));
        let input = map(&levels);
        let strongest = ranked(&input)[0].neuron_id;
        let runner_up = ranked(&input)[1].neuron_id;

        let (result, report) = stabilize(&input, &StabilizationConfig::default());

        assert!(report.converged);
        assert!(result[&strongest].level <= 1.0);
        assert!(
            result[&strongest].level > result[&runner_up].level,
            "{} vs {}",
            result[&strongest].level,
            result[&runner_up].level
        );
        let weak: Vec<f32> = result
            .values()
            .filter(|r| r.neuron_id != strongest && r.neuron_id != runner_up)
            .map(|r| r.level)
            .collect();
        assert!(weak.iter().all(|&level| level < result[&runner_up].level));
    }

    #[test]
    fn test_iteration_cap_returns_best_effort() {
        let config = StabilizationConfig {
            max_iterations: 1,
            ..Default::default()
        };
        let (result, report) = stabilize(&map(&[1.0, 0.9]), &config);
        assert_eq!(report.iterations, 1);
        assert!(!report.converged);
        assert_eq!(result.len(), 2);
    }
}
