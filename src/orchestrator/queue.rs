//! The orchestrator's single FIFO event queue.
//!
//! Events travel over a tokio unbounded channel, so no sender ever blocks:
//! the wake-word engine's callback thread can enqueue directly.  Wake-word
//! activations are admitted through a single pending slot: while one
//! `WakewordDetected` sits in the queue, further activations are rejected.
//! A burst of false triggers therefore adds at most one event.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::intent::IntentResult;

// ---------------------------------------------------------------------------
// OrchestratorEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum OrchestratorEvent {
    WakewordDetected,
    TranscriptReady(String),
    IntentReady(IntentResult),
}

impl OrchestratorEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorEvent::WakewordDetected => "WakewordDetected",
            OrchestratorEvent::TranscriptReady(_) => "TranscriptReady",
            OrchestratorEvent::IntentReady(_) => "IntentReady",
        }
    }
}

/// Create a connected sender/receiver pair.
pub fn event_queue() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let pending = Arc::new(AtomicBool::new(false));
    (
        EventSender {
            tx,
            activation_pending: Arc::clone(&pending),
        },
        EventReceiver {
            rx,
            activation_pending: pending,
        },
    )
}

// ---------------------------------------------------------------------------
// EventSender
// ---------------------------------------------------------------------------

/// Cheap to clone; usable from any thread, async or not.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<OrchestratorEvent>,
    activation_pending: Arc<AtomicBool>,
}

impl EventSender {
    /// Enqueue `WakewordDetected` unless one is already pending.
    ///
    /// Never blocks.  Returns `true` when the activation was queued.
    pub fn activate(&self) -> bool {
        if self
            .activation_pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("orchestrator: activation already pending, rejected");
            return false;
        }
        if self.tx.send(OrchestratorEvent::WakewordDetected).is_err() {
            self.activation_pending.store(false, Ordering::Release);
            log::warn!("orchestrator: queue closed, activation dropped");
            return false;
        }
        true
    }

    /// Enqueue any event.  Activations go through [`activate`](Self::activate).
    ///
    /// Returns `false` when the event was not queued.
    pub fn send(&self, event: OrchestratorEvent) -> bool {
        match event {
            OrchestratorEvent::WakewordDetected => self.activate(),
            other => self.tx.send(other).is_ok(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventReceiver
// ---------------------------------------------------------------------------

/// Sole reader of the queue.
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<OrchestratorEvent>,
    activation_pending: Arc<AtomicBool>,
}

impl EventReceiver {
    /// Next event; `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<OrchestratorEvent> {
        let event = self.rx.recv().await;
        self.dequeued(event.as_ref());
        event
    }

    /// Next event if one is queued right now.
    pub fn try_recv(&mut self) -> Option<OrchestratorEvent> {
        let event = self.rx.try_recv().ok();
        self.dequeued(event.as_ref());
        event
    }

    fn dequeued(&self, event: Option<&OrchestratorEvent>) {
        if matches!(event, Some(OrchestratorEvent::WakewordDetected)) {
            self.activation_pending.store(false, Ordering::Release);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
