//! Intent/entity parsing.
//!
//! Free text goes to a remote service over HTTP; the answer is an
//! [`IntentResult`] (label, confidence, entities).  [`ActuationRequest`]
//! turns that result into relay channels plus an on/off mode.
//!
//! Wire format:
//!
//! ```text
//! POST <uri>   {"text": "turn on the lights"}
//! 200          {"intent": {"label": "switch-on", "score": 0.97},
//!               "entities": [{"entity": "light_name", "value": "main"}]}
//! ```

pub mod actuation;
pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use actuation::{mode_for_label, ActuationRequest, DEFAULT_LIGHT, LIGHT_ENTITY};
pub use client::HttpIntentClient;

// ---------------------------------------------------------------------------
// IntentError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum IntentError {
    /// Configuration error: no service URI.
    #[error("intent service URI is not configured")]
    MissingUri,

    /// Transport failure (refused, reset, DNS …).
    #[error("intent service unreachable: {0}")]
    Connection(String),

    #[error("intent request timed out")]
    Timeout,

    /// The service answered, but not with a usable result.
    #[error("unexpected intent service reply: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for IntentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            IntentError::Timeout
        } else if e.is_decode() || e.is_body() {
            IntentError::Protocol(e.to_string())
        } else {
            IntentError::Connection(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// IntentResult
// ---------------------------------------------------------------------------

/// Classified intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub label: String,
    #[serde(default)]
    pub score: f32,
}

/// One `(entity-type, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub entity: String,
    pub value: String,
}

impl Entity {
    pub fn new(entity: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            value: value.into(),
        }
    }
}

/// Parsed utterance as returned by the intent service.  Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: Intent,
    #[serde(default)]
    pub entities: Vec<Entity>,
}

impl IntentResult {
    pub fn new(label: impl Into<String>, score: f32, entities: Vec<Entity>) -> Self {
        Self {
            intent: Intent {
                label: label.into(),
                score,
            },
            entities,
        }
    }

    pub fn label(&self) -> &str {
        &self.intent.label
    }

    pub fn score(&self) -> f32 {
        self.intent.score
    }

    /// Values of every entity of type `kind`, in order.
    pub fn values_of<'a>(&'a self, kind: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entities
            .iter()
            .filter(move |e| e.entity == kind)
            .map(|e| e.value.as_str())
    }
}

// ---------------------------------------------------------------------------
// IntentParser trait
// ---------------------------------------------------------------------------

/// Async intent parsing.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn IntentParser>`.
#[async_trait]
pub trait IntentParser: Send + Sync {
    async fn parse(&self, text: &str) -> Result<IntentResult, IntentError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_deserialises_from_service_reply() {
        let body = r#"{
            "sentence": "turn on the lights",
            "intent": {"label": "switch-on", "score": 0.97},
            "entities": [{"entity": "light_name", "value": "main"}]
        }"#;
        let result: IntentResult = serde_json::from_str(body).unwrap();
        assert_eq!(result.label(), "switch-on");
        assert!((result.score() - 0.97).abs() < 1e-6);
        assert_eq!(result.entities, vec![Entity::new("light_name", "main")]);
    }

    #[test]
    fn missing_entities_default_to_empty() {
        let result: IntentResult =
            serde_json::from_str(r#"{"intent": {"label": "greet"}}"#).unwrap();
        assert!(result.entities.is_empty());
        assert_eq!(result.score(), 0.0);
    }

    #[test]
    fn values_of_filters_by_type() {
        let result = IntentResult::new(
            "switch-off",
            0.8,
            vec![
                Entity::new("light_name", "l1"),
                Entity::new("room", "kitchen"),
                Entity::new("light_name", "l3"),
            ],
        );
        let lights: Vec<_> = result.values_of("light_name").collect();
        assert_eq!(lights, vec!["l1", "l3"]);
    }
}
