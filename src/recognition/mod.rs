//! Streaming speech recognition against a remote websocket service.
//!
//! # Architecture
//!
//! ```text
//! AudioCapture ──AudioBlock (unbounded mpsc)──▶ StreamingRecognitionSession
//!                                                  │  VAD gate
//!                                                  │  TimeoutPolicy (silence / voice)
//!                                                  ▼
//!                                     RecognitionConnection (websocket)
//!                                       config → [pcm → reply]* → eof → final
//! ```
//!
//! [`StreamingRecognitionSession`] runs one bounded live session.
//! [`transcribe_wav`] replays a recorded file through the identical
//! per-block exchange, without VAD gating or timeouts.
//! [`LiveRecognizer`] ties a fresh microphone capture to each session and is
//! what the orchestrator drives.

pub mod batch;
pub mod policy;
pub mod recognizer;
pub mod session;
pub mod transport;
pub mod wire;

use std::time::Duration;

use thiserror::Error;

use crate::audio::{CaptureError, VadError};

pub use batch::transcribe_wav;
pub use policy::{PolicyDecision, TimeoutPolicy};
pub use recognizer::{LiveRecognizer, Recognizer};
pub use session::{SessionState, StreamingRecognitionSession};
pub use transport::{RecognitionConnection, RecognitionConnector, WsConnector};

// test-only re-export so other modules' tests can script a service
#[cfg(test)]
pub use transport::MockConnector;

// ---------------------------------------------------------------------------
// RecognitionError
// ---------------------------------------------------------------------------

/// Everything that can end a recognition session early.
///
/// Malformed replies are *not* here: they are logged and read as empty.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Configuration error: bad VAD sub-block or sample rate.
    #[error("VAD configuration: {0}")]
    Vad(#[from] VadError),

    /// Configuration error: no service URI.
    #[error("recognition service URI is not configured")]
    MissingUri,

    /// Configuration error: the recording cannot be streamed as-is.
    #[error("unsupported recording: {0}")]
    UnsupportedWav(String),

    #[error("failed to read recording: {0}")]
    Wav(#[from] hound::Error),

    /// Transport failure; the session is abandoned.
    #[error("recognition service connection failed: {0}")]
    Connection(String),

    /// No server message within the configured reply timeout.
    #[error("no reply from recognition service within {0:?}")]
    ReplyTimeout(Duration),

    #[error("audio capture failed: {0}")]
    Capture(#[from] CaptureError),

    /// A blocking helper task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for RecognitionError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        RecognitionError::Connection(e.to_string())
    }
}

impl From<tokio::task::JoinError> for RecognitionError {
    fn from(e: tokio::task::JoinError) -> Self {
        RecognitionError::Task(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Transcript
// ---------------------------------------------------------------------------

/// Why a session stopped producing audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptStatus {
    /// Every window of a recording was streamed.
    Completed,
    /// `max_silence_secs` of consecutive silence.
    SilenceTimeout,
    /// `max_voice_secs` of voice streamed.
    VoiceLimit,
    /// The audio source stopped delivering blocks.
    InputClosed,
}

impl TranscriptStatus {
    pub fn label(&self) -> &'static str {
        match self {
            TranscriptStatus::Completed => "completed",
            TranscriptStatus::SilenceTimeout => "silence timeout",
            TranscriptStatus::VoiceLimit => "voice limit",
            TranscriptStatus::InputClosed => "input closed",
        }
    }
}

/// Final recognized text plus how the session ended.  Text may be empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
    pub status: TranscriptStatus,
}

impl Transcript {
    pub fn new(text: impl Into<String>, status: TranscriptStatus) -> Self {
        Self {
            text: text.into(),
            status,
        }
    }

    /// `true` when nothing but whitespace was recognized.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}
