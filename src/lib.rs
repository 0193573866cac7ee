//! Voice-controlled light switching.
//!
//! A wake word opens a VAD-gated streaming session to a websocket speech
//! recognition service; the transcript goes to an intent service over HTTP;
//! `switch-on` / `switch-off` intents drive a four-channel relay board.
//! [`orchestrator::SessionOrchestrator`] sequences the whole cycle, one
//! session at a time.

pub mod audio;
pub mod config;
pub mod context;
pub mod indicator;
pub mod intent;
pub mod orchestrator;
pub mod recognition;
pub mod relay;
pub mod wakeword;
