//! Session orchestrator: sequences wake word → recognition → intent parsing →
//! relay actuation, one event at a time.
//!
//! # Architecture
//!
//! ```text
//! wake-word thread ──activate()──┐
//!                                ▼
//!                      EventQueue (unbounded, FIFO, ≤1 pending activation)
//!                                │
//!                                ▼
//!          SessionOrchestrator::run()  ← single tokio task
//!                                │
//!          ├─ WakewordDetected → Recognizer::listen      → TranscriptReady
//!          ├─ TranscriptReady  → IntentParser::parse     → IntentReady
//!          └─ IntentReady      → RelayActuator::switch   → Idle
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_lights::context::AppContext;
//! use voice_lights::intent::HttpIntentClient;
//! use voice_lights::orchestrator::{event_queue, SessionOrchestrator};
//! use voice_lights::recognition::{LiveRecognizer, WsConnector};
//! use voice_lights::relay::{JsonStateStore, LogBus, RelayBoard};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let ctx = AppContext::with_defaults();
//! let connector = Arc::new(WsConnector::from_config(&ctx.config.recognition)?);
//! let recognizer = Arc::new(LiveRecognizer::new(ctx.clone(), connector));
//! let parser = Arc::new(HttpIntentClient::from_config(&ctx.config.intent)?);
//! let board = RelayBoard::open(LogBus, JsonStateStore::new(ctx.config.relay.state_path()))?;
//!
//! let (events, rx) = event_queue();
//! let mut orchestrator =
//!     SessionOrchestrator::new(&ctx, recognizer, parser, Box::new(board), events.clone());
//!
//! // events.activate() is handed to the wake-word engine.
//! orchestrator.run(rx).await;
//! # Ok(())
//! # }
//! ```

pub mod queue;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use queue::{event_queue, EventReceiver, EventSender, OrchestratorEvent};
pub use runner::{OrchestratorError, SessionOrchestrator};
pub use state::OrchestratorState;
