use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::activation::{ActivationConfig, InhibitionConfig, ReflexConfig, StabilizationConfig};
use crate::error::{Result, SynapticError};
use crate::learning::LearningConfig;
use crate::retrieval::PipelineConfig;

/// Main configuration structure for Synaptic
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Classic spreading activation
    #[serde(default)]
    pub activation: ActivationConfig,
    /// Reflex trail activation and co-activation binding
    #[serde(default)]
    pub reflex: ReflexConfig,
    /// Iterative dampening and homeostasis
    #[serde(default)]
    pub stabilization: StabilizationConfig,
    /// Lateral inhibition
    #[serde(default)]
    pub inhibition: InhibitionConfig,
    /// Hebbian weight updates
    #[serde(default)]
    pub learning: LearningConfig,
    /// Query pipeline
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Parse a TOML configuration string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| SynapticError::Config(format!("Failed to parse config: {e}")))
    }

    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading config from: {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|e| {
            SynapticError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Load the first config file found in the default locations, or defaults.
    ///
    /// Searched in order: `~/.synaptic/config.toml`,
    /// `<config_dir>/synaptic/config.toml`, `./synaptic.toml`.
    pub fn discover() -> Result<Self> {
        for path in default_paths() {
            if path.exists() {
                return Self::load(&path);
            }
        }
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }
}

/// Candidate config file locations, in search order
pub fn default_paths() -> Vec<PathBuf> {
    [
        dirs::home_dir().map(|h| h.join(".synaptic").join("config.toml")),
        dirs::config_dir().map(|c| c.join("synaptic").join("config.toml")),
        Some(PathBuf::from("synaptic.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::ActivationStrategy;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.activation.decay_factor, 0.5);
        assert_eq!(config.activation.max_spread_hops, 4);
        assert_eq!(config.reflex.decay_rate, 0.15);
        assert_eq!(config.stabilization.noise_floor, 0.05);
        assert_eq!(config.inhibition.top_k, 10);
        assert_eq!(config.learning.learning_rate, 0.05);
        assert_eq!(config.pipeline.strategy, ActivationStrategy::Hybrid);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[activation]
decay_factor = 0.6
min_activation = 0.02
max_spread_hops = 6

[reflex]
decay_rate = 0.2
co_activation_window_ms = 1000

[stabilization]
max_iterations = 5

[inhibition]
top_k = 4
suppression_factor = 0.5

[learning]
learning_rate = 0.1

[pipeline]
strategy = "reflex"
max_context_tokens = 800
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse TOML");

        assert_eq!(config.activation.decay_factor, 0.6);
        assert_eq!(config.activation.min_activation, 0.02);
        assert_eq!(config.activation.max_spread_hops, 6);
        assert_eq!(config.activation.min_synapse_weight, 0.1);

        assert_eq!(config.reflex.decay_rate, 0.2);
        assert_eq!(config.reflex.co_activation_window_ms, 1000);
        assert_eq!(config.reflex.activation_threshold, 0.1);

        assert_eq!(config.stabilization.max_iterations, 5);
        assert_eq!(config.stabilization.dampening, 0.85);

        assert_eq!(config.inhibition.top_k, 4);
        assert_eq!(config.inhibition.suppression_factor, 0.5);

        assert_eq!(config.learning.learning_rate, 0.1);
        assert_eq!(config.learning.weight_max, 1.0);

        assert_eq!(config.pipeline.strategy, ActivationStrategy::Reflex);
        assert_eq!(config.pipeline.max_context_tokens, 800);
        assert_eq!(config.pipeline.max_contributing, 5);
    }

    #[test]
    fn test_toml_partial_deserialization() {
        let toml_str = r#"
[pipeline]
enable_inhibition = false
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse partial TOML");

        assert!(!config.pipeline.enable_inhibition);
        assert!(config.pipeline.enable_stabilization);
        assert_eq!(config.activation.decay_factor, 0.5);
        assert_eq!(config.stabilization.max_iterations, 10);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = Config::from_toml("[activation\ndecay_factor = ").unwrap_err();
        assert!(matches!(err, SynapticError::Config(_)));
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let err = Config::from_toml("[pipeline]\nstrategy = \"telepathy\"\n").unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        writeln!(file, "[activation]\nmax_spread_hops = 2").expect("Failed to write config");

        let config = Config::load(file.path()).expect("Failed to load config");
        assert_eq!(config.activation.max_spread_hops, 2);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let err = Config::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, SynapticError::Config(_)));
    }

    #[test]
    fn test_default_paths_end_with_local_file() {
        let paths = default_paths();
        assert_eq!(paths.last(), Some(&PathBuf::from("synaptic.toml")));
    }
}
