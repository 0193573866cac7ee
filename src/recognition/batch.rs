//! Batch replay of a recorded WAV file.
//!
//! The recording is cut into fixed windows (`window_secs`, 0.2 s by default)
//! and streamed through the same per-block exchange as a live session, with
//! no VAD gating and no timeout policy.  Each call opens its own connection,
//! so replaying the same file twice yields the same transcript.

use std::path::{Path, PathBuf};

use super::session::{finish, stream_block};
use super::transport::RecognitionConnector;
use super::{wire, RecognitionError, Transcript, TranscriptStatus};

/// Decoded 16-bit mono recording.
struct Recording {
    sample_rate: u32,
    samples: Vec<i16>,
}

/// Stream `path` to the service and return the final transcript.
///
/// # Errors
///
/// * [`RecognitionError::UnsupportedWav`] unless the file is 16-bit integer
///   mono PCM.
/// * [`RecognitionError::Connection`] / [`RecognitionError::ReplyTimeout`]
///   on transport failure.
pub async fn transcribe_wav(
    connector: &dyn RecognitionConnector,
    path: &Path,
    window_secs: f32,
) -> Result<Transcript, RecognitionError> {
    let owned: PathBuf = path.to_path_buf();
    let recording = tokio::task::spawn_blocking(move || read_recording(&owned)).await??;

    let window = window_frames(window_secs, recording.sample_rate);
    log::info!(
        "batch: {} ({:.2} s @ {} Hz, {} frames/window)",
        path.display(),
        recording.samples.len() as f64 / f64::from(recording.sample_rate.max(1)),
        recording.sample_rate,
        window
    );

    let mut conn = connector.connect().await?;
    conn.send_text(&wire::config_message(recording.sample_rate))
        .await?;

    let mut pcm = Vec::with_capacity(window * 2);
    for chunk in recording.samples.chunks(window) {
        pcm.clear();
        pcm.extend(chunk.iter().flat_map(|s| s.to_le_bytes()));
        stream_block(conn.as_mut(), &pcm).await?;
    }

    let text = finish(conn.as_mut()).await?;
    if let Err(e) = conn.close().await {
        log::debug!("batch: close: {e}");
    }
    log::info!("batch: '{text}'");
    Ok(Transcript::new(text, TranscriptStatus::Completed))
}

fn read_recording(path: &Path) -> Result<Recording, RecognitionError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    if spec.channels != 1 {
        return Err(RecognitionError::UnsupportedWav(format!(
            "{} channels, expected mono",
            spec.channels
        )));
    }
    if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(RecognitionError::UnsupportedWav(format!(
            "{}-bit {:?} samples, expected 16-bit PCM",
            spec.bits_per_sample, spec.sample_format
        )));
    }

    let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
    Ok(Recording {
        sample_rate: spec.sample_rate,
        samples,
    })
}

/// Frames per replay window; never zero.
fn window_frames(window_secs: f32, sample_rate: u32) -> usize {
    ((f64::from(window_secs) * f64::from(sample_rate)).round() as usize).max(1)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
