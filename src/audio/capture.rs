//! Microphone capture via `cpal`.
//!
//! [`AudioCapture::open`] starts a dedicated `audio-capture` OS thread that
//! owns the cpal device and stream (`cpal::Stream` is not `Send`).  Every
//! hardware buffer is cut into fixed-size [`AudioBlock`]s and pushed into an
//! unbounded tokio channel, so the driver callback never blocks.
//!
//! The returned [`CaptureGuard`] is a RAII handle: dropping it stops the
//! stream, closes the device and joins the thread, whichever way the owner
//! leaves scope.

use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use super::block::{AudioBlock, BlockAssembler};
use crate::config::AudioConfig;
use crate::context::AppContext;

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up the audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("no input device matches '{0}'")]
    DeviceNotFound(String),

    #[error("failed to enumerate input devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("failed to spawn capture thread: {0}")]
    Thread(#[from] std::io::Error),

    #[error("capture thread exited before the stream started")]
    ThreadExited,
}

// ---------------------------------------------------------------------------
// CaptureGuard
// ---------------------------------------------------------------------------

/// Keeps the capture thread (and its stream) alive.  Drop to release the
/// device.
pub struct CaptureGuard {
    stop: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        // Closing the channel wakes the capture thread, which drops the stream.
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("capture: audio thread panicked during shutdown");
            }
        }
        log::debug!("capture: device released");
    }
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Microphone capture built on top of `cpal`.
pub struct AudioCapture;

impl AudioCapture {
    /// Open the configured input device and start delivering blocks to `tx`.
    ///
    /// Returns once the stream is playing, or with the error that prevented
    /// it from starting.
    ///
    /// # Errors
    ///
    /// Device lookup, stream build and stream start failures are reported as
    /// the matching [`CaptureError`] variant.
    pub fn open(
        ctx: &AppContext,
        tx: UnboundedSender<AudioBlock>,
    ) -> Result<CaptureGuard, CaptureError> {
        let cfg = ctx.config.audio.clone();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<(), CaptureError>>(1);
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let stream = match build_stream(&cfg, tx) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Park until the guard is dropped.
                let _ = stop_rx.recv();
                drop(stream);
            })?;

        let guard = CaptureGuard {
            stop: Some(stop_tx),
            thread: Some(thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(guard),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CaptureError::ThreadExited),
        }
    }
}

fn build_stream(
    cfg: &AudioConfig,
    tx: UnboundedSender<AudioBlock>,
) -> Result<cpal::Stream, CaptureError> {
    let device = select_device(cfg.device.as_deref())?;
    let name = device.name().unwrap_or_else(|_| "<unnamed>".into());

    let config = cpal::StreamConfig {
        channels: cfg.channels,
        sample_rate: cpal::SampleRate(cfg.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let mut assembler =
        BlockAssembler::new(cfg.block_size as usize, cfg.sample_rate, cfg.channels);

    let stream = device.build_input_stream::<i16, _, _>(
        &config,
        move |data: &[i16], _: &cpal::InputCallbackInfo| {
            assembler.push(data, |block| {
                // The receiver goes away when the session ends; later blocks
                // are simply discarded.
                let _ = tx.send(block);
            });
        },
        |err: cpal::StreamError| {
            log::error!("capture: cpal stream error: {err}");
        },
        None,
    )?;

    stream.play()?;
    log::info!(
        "capture: '{name}' started ({} Hz, {} ch, {} frames/block)",
        cfg.sample_rate,
        cfg.channels,
        cfg.block_size
    );
    Ok(stream)
}

/// `None` = default device; a number = index into the input device list;
/// anything else = first device whose name contains it.
fn select_device(wanted: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    let Some(wanted) = wanted else {
        return host.default_input_device().ok_or(CaptureError::NoDevice);
    };

    let mut devices = host.input_devices()?;
    let found = match parse_device_index(wanted) {
        Some(index) => devices.nth(index),
        None => devices.find(|d| d.name().is_ok_and(|n| n.contains(wanted))),
    };
    found.ok_or_else(|| CaptureError::DeviceNotFound(wanted.to_string()))
}

fn parse_device_index(wanted: &str) -> Option<usize> {
    wanted.trim().parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
