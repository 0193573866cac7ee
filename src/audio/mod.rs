//! Audio front end — microphone capture → fixed-size blocks → VAD.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal callback (audio-capture thread) → BlockAssembler
//!           → AudioBlock (unbounded mpsc) → VoiceActivityDetector
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use tokio::sync::mpsc;
//! use voice_lights::audio::{AudioBlock, AudioCapture};
//! use voice_lights::context::AppContext;
//!
//! # async fn example() {
//! let ctx = AppContext::with_defaults();
//! let (tx, mut rx) = mpsc::unbounded_channel::<AudioBlock>();
//! let _guard = AudioCapture::open(&ctx, tx).unwrap(); // drop guard → stops stream
//!
//! while let Some(block) = rx.recv().await {
//!     println!("{} frames @ {} Hz", block.frames(), block.sample_rate());
//! }
//! # }
//! ```

pub mod block;
pub mod capture;
pub mod vad;

pub use block::{AudioBlock, BlockAssembler};
pub use capture::{AudioCapture, CaptureError, CaptureGuard};
pub use vad::{EarshotClassifier, SpeechClassifier, VadError, VoiceActivityDetector};
