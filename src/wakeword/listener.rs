//! Dedicated OS-thread wake-word listener.
//!
//! [`WakewordListener`] opens its own capture stream, re-chunks the blocks to
//! the engine's chunk size and runs engine + trigger on a `wakeword-engine`
//! thread.  The activation callback is invoked from that thread, so it must
//! not block.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use super::precise::{PreciseEngine, WakewordEngine};
use super::trigger::TriggerDetector;
use super::WakewordError;
use crate::audio::{AudioBlock, AudioCapture, CaptureGuard};
use crate::config::WakewordConfig;
use crate::context::AppContext;

// ---------------------------------------------------------------------------
// WakewordDetector
// ---------------------------------------------------------------------------

/// Engine plus trigger over an arbitrary-length PCM byte stream.
pub struct WakewordDetector<E: WakewordEngine> {
    engine: E,
    trigger: TriggerDetector,
    pending: Vec<u8>,
}

impl<E: WakewordEngine> WakewordDetector<E> {
    pub fn new(engine: E, cfg: &WakewordConfig) -> Self {
        let chunk = engine.chunk_size();
        Self {
            trigger: TriggerDetector::new(chunk, cfg.sensitivity, cfg.trigger_level),
            pending: Vec::with_capacity(chunk),
            engine,
        }
    }

    /// Feed PCM bytes; returns how many activations fired.  Bytes short of a
    /// full chunk are kept for the next call.
    pub fn feed(&mut self, mut pcm: &[u8]) -> Result<usize, WakewordError> {
        let chunk = self.engine.chunk_size();
        let mut fired = 0;

        while !pcm.is_empty() {
            let take = (chunk - self.pending.len()).min(pcm.len());
            self.pending.extend_from_slice(&pcm[..take]);
            pcm = &pcm[take..];

            if self.pending.len() == chunk {
                let prob = self.engine.predict(&self.pending)?;
                self.pending.clear();
                log::trace!("wakeword: p={prob:.3}");
                if self.trigger.update(prob) {
                    fired += 1;
                }
            }
        }
        Ok(fired)
    }
}

// ---------------------------------------------------------------------------
// WakewordListener
// ---------------------------------------------------------------------------

/// Handle to a running listener.  Drop it to stop the engine and release the
/// microphone.
pub struct WakewordListener {
    stop: Arc<AtomicBool>,
    capture: Option<CaptureGuard>,
    thread: Option<JoinHandle<()>>,
}

impl WakewordListener {
    /// Start the configured engine and call `on_activation` for every
    /// detection.
    pub fn start<F>(ctx: &AppContext, on_activation: F) -> Result<Self, WakewordError>
    where
        F: Fn() + Send + 'static,
    {
        let engine = PreciseEngine::spawn(&ctx.config.wakeword)?;
        let detector = WakewordDetector::new(engine, &ctx.config.wakeword);

        let (tx, rx) = mpsc::unbounded_channel();
        let capture = AudioCapture::open(ctx, tx)?;

        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("wakeword-engine".into())
            .spawn(move || detection_loop(detector, rx, stop_clone, on_activation))
            .map_err(WakewordError::Thread)?;

        log::info!("wakeword: listening");
        Ok(Self {
            stop,
            capture: Some(capture),
            thread: Some(thread),
        })
    }
}

fn detection_loop<E, F>(
    mut detector: WakewordDetector<E>,
    mut rx: mpsc::UnboundedReceiver<AudioBlock>,
    stop: Arc<AtomicBool>,
    on_activation: F,
) where
    E: WakewordEngine,
    F: Fn(),
{
    let mut count: u64 = 0;
    // blocking_recv is fine: this is a plain OS thread.
    while let Some(block) = rx.blocking_recv() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        match detector.feed(block.pcm()) {
            Ok(0) => {}
            Ok(fired) => {
                for _ in 0..fired {
                    count += 1;
                    log::info!("wakeword: detected ({count})");
                    on_activation();
                }
            }
            Err(e) => {
                log::error!("wakeword: engine failed, detection stopped: {e}");
                break;
            }
        }
    }
    log::debug!("wakeword: detection loop exited");
}

impl Drop for WakewordListener {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        // Releasing the device closes the block channel and ends the loop.
        self.capture.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("wakeword: engine thread panicked");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
