//! [`HttpIntentClient`]: `POST {"text": …}` to the configured intent service.
//!
//! All connection details come from [`IntentConfig`].  Transport failures
//! surface as [`IntentError::Connection`] / [`IntentError::Timeout`]; a reply
//! that is not a usable result (HTTP error status, `{"error": …}` body,
//! malformed JSON) is an [`IntentError::Protocol`].

use std::time::Duration;

use async_trait::async_trait;

use super::{IntentError, IntentParser, IntentResult};
use crate::config::IntentConfig;

pub struct HttpIntentClient {
    client: reqwest::Client,
    uri: String,
}

impl HttpIntentClient {
    /// Build a client with the per-request timeout from `config.timeout_secs`.
    ///
    /// # Errors
    ///
    /// [`IntentError::MissingUri`] when `config.uri` is blank.
    pub fn from_config(config: &IntentConfig) -> Result<Self, IntentError> {
        let uri = config.uri.trim();
        if uri.is_empty() {
            return Err(IntentError::MissingUri);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Ok(Self {
            client,
            uri: uri.to_string(),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[async_trait]
impl IntentParser for HttpIntentClient {
    async fn parse(&self, text: &str) -> Result<IntentResult, IntentError> {
        log::debug!("intent: POST {} text={text:?}", self.uri);

        let body = serde_json::json!({ "text": text });
        let response = self.client.post(&self.uri).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IntentError::Protocol(format!("HTTP {status}")));
        }

        let json: serde_json::Value = response.json().await?;
        let result = parse_body(json)?;
        log::info!(
            "intent: '{}' ({:.2}) entities={:?}",
            result.label(),
            result.score(),
            result.entities
        );
        Ok(result)
    }
}

/// Interpret a decoded response body.
fn parse_body(json: serde_json::Value) -> Result<IntentResult, IntentError> {
    if let Some(err) = json.get("error") {
        let msg = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
        return Err(IntentError::Protocol(msg));
    }
    serde_json::from_value(json).map_err(|e| IntentError::Protocol(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
