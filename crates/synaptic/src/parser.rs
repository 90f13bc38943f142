//! Query parsing interface
//!
//! Turning free text into a `Stimulus` (intent, time ranges, entities,
//! keywords) is the job of an external extractor. Retrieval only consumes the
//! result through the `QueryParser` trait.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the query is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryIntent {
    AskWhat,
    AskWhere,
    AskWhen,
    AskWho,
    AskWhy,
    AskHow,
    AskFeeling,
    AskPattern,
    Compare,
    Recall,
    Confirm,
    Unknown,
}

/// A time range referenced by the query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeHint {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeHint {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }
}

/// An entity mention recognised in the query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityHint {
    pub text: String,
}

impl EntityHint {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Structured cues extracted from a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stimulus {
    pub intent: QueryIntent,
    pub time_hints: Vec<TimeHint>,
    pub entities: Vec<EntityHint>,
    /// Keywords, most important first
    pub keywords: Vec<String>,
    pub raw_query: String,
}

impl Stimulus {
    /// A stimulus with no cues besides the raw text
    pub fn new(raw_query: impl Into<String>, intent: QueryIntent) -> Self {
        Self {
            intent,
            time_hints: Vec::new(),
            entities: Vec::new(),
            keywords: Vec::new(),
            raw_query: raw_query.into(),
        }
    }

    pub fn with_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entities
            .extend(entities.into_iter().map(EntityHint::new));
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(keywords.into_iter().map(Into::into));
        self
    }

    pub fn with_time_hint(mut self, hint: TimeHint) -> Self {
        self.time_hints.push(hint);
        self
    }
}

/// Extracts a `Stimulus` from query text
pub trait QueryParser: Send + Sync {
    fn parse(&self, text: &str, reference_time: DateTime<Utc>) -> Stimulus;
}
