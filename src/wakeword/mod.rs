//! Wake-word detection.
//!
//! An external Precise-compatible engine scores audio chunk by chunk; a
//! [`TriggerDetector`] turns the scores into activations; a
//! [`WakewordListener`] ties both to a capture stream on its own thread.

pub mod listener;
pub mod precise;
pub mod trigger;

use thiserror::Error;

use crate::audio::CaptureError;

// ---------------------------------------------------------------------------
// WakewordError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WakewordError {
    #[error("wake-word chunk size must be a positive even number of bytes, got {0}")]
    InvalidChunkSize(usize),

    #[error("failed to start wake-word engine '{engine}': {source}")]
    Spawn {
        engine: String,
        #[source]
        source: std::io::Error,
    },

    #[error("wake-word engine pipe: {0}")]
    Pipe(#[from] std::io::Error),

    #[error("wake-word engine exited")]
    EngineExited,

    #[error("wake-word engine sent an unreadable prediction: '{0}'")]
    BadPrediction(String),

    #[error("failed to spawn wake-word thread: {0}")]
    Thread(#[source] std::io::Error),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use listener::{WakewordDetector, WakewordListener};
pub use precise::{PreciseEngine, WakewordEngine};
pub use trigger::TriggerDetector;
