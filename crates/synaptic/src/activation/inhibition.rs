//! Lateral inhibition: winners keep their level, the rest are suppressed

use serde::Deserialize;
use tracing::debug;

use crate::activation::{ActivationMap, ranked};

/// Configuration for lateral inhibition
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct InhibitionConfig {
    /// Number of strongest neurons left untouched (default: 10)
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Multiplier applied to everything outside the top-k (default: 0.7)
    #[serde(default = "default_suppression_factor")]
    pub suppression_factor: f32,
    /// Suppressed neurons below this are dropped (default: 0.1)
    #[serde(default = "default_min_activation")]
    pub min_activation: f32,
}

impl Default for InhibitionConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            suppression_factor: default_suppression_factor(),
            min_activation: default_min_activation(),
        }
    }
}

fn default_top_k() -> usize {
    10
}

fn default_suppression_factor() -> f32 {
    0.7
}

fn default_min_activation() -> f32 {
    0.1
}

/// Keep the `top_k` strongest activations unchanged, scale the rest by
/// `suppression_factor`, and drop suppressed ones that fall below
/// `min_activation`.
pub fn apply_lateral_inhibition(activations: &ActivationMap, config: &InhibitionConfig) -> ActivationMap {
    let factor = config.suppression_factor.clamp(0.0, 1.0);
    let before = activations.len();

    let inhibited: ActivationMap = ranked(activations)
        .into_iter()
        .enumerate()
        .filter_map(|(rank, result)| {
            let mut result = result.clone();
            if rank >= config.top_k {
                result.level *= factor;
                if result.level < config.min_activation {
                    return None;
                }
            }
            Some((result.neuron_id, result))
        })
        .collect();

    debug!(
        before,
        after = inhibited.len(),
        top_k = config.top_k,
        "Lateral inhibition applied"
    );
    inhibited
}
