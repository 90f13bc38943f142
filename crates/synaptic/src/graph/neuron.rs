//! Neuron and NeuronState types
//!
//! A `Neuron` is an immutable semantic fact. Everything that churns during
//! retrieval lives in the separate `NeuronState` record keyed by the same id.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default level at which a neuron counts as firing
pub const DEFAULT_FIRING_THRESHOLD: f32 = 0.3;

/// Default refractory window after an activation
pub const DEFAULT_REFRACTORY_PERIOD_MS: u32 = 500;

/// Default level stabilization pulls toward
pub const DEFAULT_HOMEOSTATIC_TARGET: f32 = 0.5;

/// Default per-hour activation decay
pub const DEFAULT_DECAY_RATE: f32 = 0.1;

/// Kind of semantic atom a neuron represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeuronType {
    /// A point or span in time
    Time,
    /// A place
    Spatial,
    /// A person, project, thing
    Entity,
    /// Something that happened or was done
    Action,
    /// A condition or status
    State,
    /// An abstract idea
    Concept,
    /// A perception or feeling
    Sensory,
    /// A goal or plan
    Intent,
}

impl NeuronType {
    /// Short lowercase label used when formatting context
    pub fn label(&self) -> &'static str {
        match self {
            NeuronType::Time => "time",
            NeuronType::Spatial => "spatial",
            NeuronType::Entity => "entity",
            NeuronType::Action => "action",
            NeuronType::State => "state",
            NeuronType::Concept => "concept",
            NeuronType::Sensory => "sensory",
            NeuronType::Intent => "intent",
        }
    }
}

/// An immutable semantic atom in the memory graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neuron {
    /// Unique identifier, stable across `with_*` copies
    pub id: Uuid,
    /// What kind of atom this is
    pub neuron_type: NeuronType,
    /// The fact text
    pub content: String,
    /// Free-form metadata attached by the encoder
    pub metadata: HashMap<String, serde_json::Value>,
    /// 64-bit content fingerprint, 0 when unset
    pub content_hash: u64,
    /// When this neuron was created
    pub created_at: DateTime<Utc>,
}

impl Neuron {
    /// Create a new neuron with a fresh id and a computed content fingerprint
    pub fn new(neuron_type: NeuronType, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            neuron_type,
            content_hash: content_fingerprint(&content),
            content,
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Copy with an additional metadata entry
    pub fn with_metadata(&self, key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut next = self.clone();
        next.metadata.insert(key.into(), value);
        next
    }

    /// Copy with new content; the fingerprint follows the content
    pub fn with_content(&self, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            content_hash: content_fingerprint(&content),
            content,
            ..self.clone()
        }
    }

    /// Copy with a different creation time
    pub fn with_created_at(&self, created_at: DateTime<Utc>) -> Self {
        Self {
            created_at,
            ..self.clone()
        }
    }

    /// Numeric metadata value, if present
    pub fn metadata_f32(&self, key: &str) -> Option<f32> {
        self.metadata
            .get(key)
            .and_then(|v| v.as_f64())
            .map(|v| v as f32)
    }
}

/// FNV-1a over the lowercased, trimmed content. Never returns 0 so that 0 can
/// keep meaning "unset".
pub fn content_fingerprint(content: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let hash = content
        .trim()
        .to_lowercase()
        .bytes()
        .fold(OFFSET, |acc, b| (acc ^ b as u64).wrapping_mul(PRIME));
    hash.max(1)
}

/// Mutable activation record for a neuron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronState {
    /// Neuron this state belongs to
    pub neuron_id: Uuid,
    /// Current activation in [0, 1]
    pub activation_level: f32,
    /// How many times the neuron has been activated
    pub access_frequency: u32,
    /// Last successful activation
    pub last_activated: Option<DateTime<Utc>>,
    /// Activation lost per hour, exponential
    pub decay_rate: f32,
    /// Level at or above which the neuron counts as firing
    pub firing_threshold: f32,
    /// Reactivation before this instant is a no-op
    pub refractory_until: Option<DateTime<Utc>>,
    /// Length of the cool-down started by each activation
    pub refractory_period_ms: u32,
    /// Level stabilization pulls toward
    pub homeostatic_target: f32,
    /// When the state record was created
    pub created_at: DateTime<Utc>,
}

impl NeuronState {
    /// Create a resting state for a neuron
    pub fn new(neuron_id: Uuid) -> Self {
        Self {
            neuron_id,
            activation_level: 0.0,
            access_frequency: 0,
            last_activated: None,
            decay_rate: DEFAULT_DECAY_RATE,
            firing_threshold: DEFAULT_FIRING_THRESHOLD,
            refractory_until: None,
            refractory_period_ms: DEFAULT_REFRACTORY_PERIOD_MS,
            homeostatic_target: DEFAULT_HOMEOSTATIC_TARGET,
            created_at: Utc::now(),
        }
    }

    /// Copy with a different decay rate (memory kinds fade at different speeds)
    pub fn with_decay_rate(&self, decay_rate: f32) -> Self {
        Self {
            decay_rate: decay_rate.max(0.0),
            ..self.clone()
        }
    }

    /// Whether `now` falls inside the refractory window
    pub fn in_refractory(&self, now: DateTime<Utc>) -> bool {
        self.refractory_until.is_some_and(|until| now < until)
    }

    /// Whether the current level reaches the firing threshold
    pub fn is_firing(&self) -> bool {
        self.activation_level >= self.firing_threshold
    }

    /// Activate the neuron at `level`.
    ///
    /// Inside the refractory window this returns an unchanged copy.
    pub fn activate(&self, level: f32, now: DateTime<Utc>) -> Self {
        if self.in_refractory(now) {
            return self.clone();
        }

        let window_end = now + Duration::milliseconds(self.refractory_period_ms as i64);
        let refractory_until = match self.refractory_until {
            Some(existing) if existing > window_end => existing,
            _ => window_end,
        };

        Self {
            activation_level: clamp_unit(level),
            access_frequency: self.access_frequency.saturating_add(1),
            last_activated: Some(now),
            refractory_until: Some(refractory_until),
            ..self.clone()
        }
    }

    /// Decay the level exponentially by the hours since the last activation
    pub fn decay(&self, now: DateTime<Utc>) -> Self {
        let Some(last) = self.last_activated else {
            return self.clone();
        };
        let hours = ((now - last).num_milliseconds().max(0) as f32) / 3_600_000.0;
        let level = self.activation_level * (-self.decay_rate * hours).exp();
        Self {
            activation_level: clamp_unit(level),
            ..self.clone()
        }
    }
}

/// Clamp to [0, 1], mapping NaN to 0
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
