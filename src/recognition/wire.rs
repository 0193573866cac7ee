//! JSON messages exchanged with the recognition service.
//!
//! ```text
//! → {"config": {"sample_rate": 16000}}     once, no reply
//! → <binary pcm>                            per block
//! ← {"partial": "turn on"} | {"text": …}    per block
//! → {"eof": 1}                              once
//! ← {"text": "turn on the lights"}          final
//! ```

use serde::Deserialize;

/// End-of-stream marker.
pub const EOF_MESSAGE: &str = r#"{"eof":1}"#;

/// One-time stream configuration.
pub fn config_message(sample_rate: u32) -> String {
    serde_json::json!({ "config": { "sample_rate": sample_rate } }).to_string()
}

/// Server reply.  Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Reply {
    /// Recognized (final or utterance-final) text.
    #[serde(default)]
    pub text: Option<String>,
    /// In-progress hypothesis.
    #[serde(default)]
    pub partial: Option<String>,
}

/// Strict parse of one reply.
pub fn parse_reply(raw: &str) -> Result<Reply, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Parse one reply; a malformed message is logged and read as empty.
pub fn parse_reply_lenient(raw: &str) -> Reply {
    match parse_reply(raw) {
        Ok(reply) => reply,
        Err(e) => {
            log::warn!("session: ignoring malformed reply ({e}): {raw:.120}");
            Reply::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_message_shape() {
        let v: serde_json::Value = serde_json::from_str(&config_message(16_000)).unwrap();
        assert_eq!(v, serde_json::json!({"config": {"sample_rate": 16000}}));
    }

    #[test]
    fn eof_message_shape() {
        let v: serde_json::Value = serde_json::from_str(EOF_MESSAGE).unwrap();
        assert_eq!(v, serde_json::json!({"eof": 1}));
    }

    #[test]
    fn reply_fields_are_optional() {
        assert_eq!(parse_reply("{}").unwrap(), Reply::default());

        let reply = parse_reply(r#"{"result": [], "text": "lights on"}"#).unwrap();
        assert_eq!(reply.text.as_deref(), Some("lights on"));
        assert!(reply.partial.is_none());

        let reply = parse_reply(r#"{"partial": "lights"}"#).unwrap();
        assert_eq!(reply.partial.as_deref(), Some("lights"));
    }

    #[test]
    fn malformed_reply_reads_as_empty() {
        assert!(parse_reply("<html>").is_err());
        assert_eq!(parse_reply_lenient("<html>"), Reply::default());
        assert_eq!(parse_reply_lenient(r#"{"text": 42}"#), Reply::default());
    }
}
