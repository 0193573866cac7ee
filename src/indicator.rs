//! Visual status feedback.
//!
//! A [`StatusIndicator`] is told what the assistant is doing (woken up,
//! listening, thinking, speaking, idle).  One instance is built at process
//! start and shared through [`AppContext`](crate::context::AppContext); there
//! is no global accessor.
//!
//! [`LogIndicator`] is the bundled implementation and simply logs each
//! transition.  LED rings and similar hardware plug in behind the same trait.

/// Sink for assistant status changes.  Calls must return quickly.
pub trait StatusIndicator: Send + Sync {
    fn wakeup(&self);
    fn listen(&self);
    fn think(&self);
    fn speak(&self);
    fn off(&self);
}

// ---------------------------------------------------------------------------
// LogIndicator
// ---------------------------------------------------------------------------

/// Writes every transition to the log at `debug` level.
#[derive(Debug, Default)]
pub struct LogIndicator;

impl StatusIndicator for LogIndicator {
    fn wakeup(&self) {
        log::debug!("indicator: wakeup");
    }

    fn listen(&self) {
        log::debug!("indicator: listen");
    }

    fn think(&self) {
        log::debug!("indicator: think");
    }

    fn speak(&self) {
        log::debug!("indicator: speak");
    }

    fn off(&self) {
        log::debug!("indicator: off");
    }
}

// ---------------------------------------------------------------------------
// RecordingIndicator  (test-only)
// ---------------------------------------------------------------------------

/// Remembers every transition in order, so tests can check the feedback a
/// cycle produced.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingIndicator {
    calls: std::sync::Mutex<Vec<&'static str>>,
}

#[cfg(test)]
impl RecordingIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transitions seen so far, oldest first.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, what: &'static str) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(what);
        }
    }
}

#[cfg(test)]
impl StatusIndicator for RecordingIndicator {
    fn wakeup(&self) {
        self.record("wakeup");
    }

    fn listen(&self) {
        self.record("listen");
    }

    fn think(&self) {
        self.record("think");
    }

    fn speak(&self) {
        self.record("speak");
    }

    fn off(&self) {
        self.record("off");
    }
}
