//! Block-level Voice Activity Detection (VAD) by sub-frame majority vote.
//!
//! ## Algorithm
//!
//! A 16-bit mono PCM block is split into consecutive sub-frames of
//! `sub_block_ms` (10, 20 or 30 ms).  Each sub-frame is classified
//! independently by a [`SpeechClassifier`]; the block is *voice* when
//!
//! ```text
//! speech_subframes / total_subframes >= voice_threshold   (default 0.9)
//! ```
//!
//! A block shorter than one sub-frame is never voice.  A trailing partial
//! sub-frame is not classified.
//!
//! The production classifier is [`EarshotClassifier`], a WebRTC-style
//! speech/non-speech primitive from the `earshot` crate.

use thiserror::Error;

use crate::config::VadConfig;

/// Sub-frame durations the classifier accepts.
pub const VALID_SUB_BLOCK_MS: [u32; 3] = [10, 20, 30];

/// Sample rates the classifier accepts.
pub const SUPPORTED_SAMPLE_RATES: [u32; 4] = [8_000, 16_000, 32_000, 48_000];

// ---------------------------------------------------------------------------
// VadError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq)]
pub enum VadError {
    /// Configuration error: raised before any classification work.
    #[error("sub-block must be one of 10/20/30 ms, got {0} ms")]
    InvalidSubBlock(u32),

    /// Configuration error: the classifier cannot handle this rate.
    #[error("unsupported sample rate for VAD: {0} Hz")]
    UnsupportedSampleRate(u32),

    #[error("speech classifier failed: {0}")]
    Classifier(String),
}

// ---------------------------------------------------------------------------
// SpeechClassifier
// ---------------------------------------------------------------------------

/// Speech / non-speech decision for one 10, 20 or 30 ms frame.
pub trait SpeechClassifier: Send {
    fn is_speech(&mut self, frame: &[i16], sample_rate: u32) -> Result<bool, VadError>;
}

/// `earshot` adapter.
pub struct EarshotClassifier {
    detector: earshot::VoiceActivityDetector,
}

impl EarshotClassifier {
    /// `aggressiveness` 0..=3; larger values reject more non-speech.
    pub fn new(aggressiveness: u8) -> Self {
        use earshot::VoiceActivityProfile as P;
        let profile = match aggressiveness {
            0 => P::QUALITY,
            1 => P::LBR,
            2 => P::AGGRESSIVE,
            _ => P::VERY_AGGRESSIVE,
        };
        Self {
            detector: earshot::VoiceActivityDetector::new(profile),
        }
    }
}

impl SpeechClassifier for EarshotClassifier {
    fn is_speech(&mut self, frame: &[i16], sample_rate: u32) -> Result<bool, VadError> {
        let result = match sample_rate {
            8_000 => self.detector.predict_8khz(frame),
            16_000 => self.detector.predict_16khz(frame),
            32_000 => self.detector.predict_32khz(frame),
            48_000 => self.detector.predict_48khz(frame),
            other => return Err(VadError::UnsupportedSampleRate(other)),
        };
        result.map_err(|e| VadError::Classifier(format!("{e:?}")))
    }
}

// ---------------------------------------------------------------------------
// VoiceActivityDetector
// ---------------------------------------------------------------------------

/// Classifies whole PCM blocks as voice or silence.
///
/// Retains nothing between calls apart from whatever the classifier keeps
/// internally.  Meant to be driven from one thread.
pub struct VoiceActivityDetector {
    classifier: Box<dyn SpeechClassifier>,
    voice_threshold: f32,
}

impl VoiceActivityDetector {
    pub fn new(classifier: Box<dyn SpeechClassifier>, voice_threshold: f32) -> Self {
        Self {
            classifier,
            voice_threshold,
        }
    }

    /// Earshot-backed detector with the configured aggressiveness/threshold.
    pub fn from_config(cfg: &VadConfig) -> Self {
        Self::new(
            Box::new(EarshotClassifier::new(cfg.aggressiveness)),
            cfg.voice_threshold,
        )
    }

    pub fn voice_threshold(&self) -> f32 {
        self.voice_threshold
    }

    /// Reject sub-block durations the classifier cannot take.
    pub fn check_sub_block(sub_block_ms: u32) -> Result<(), VadError> {
        if VALID_SUB_BLOCK_MS.contains(&sub_block_ms) {
            Ok(())
        } else {
            Err(VadError::InvalidSubBlock(sub_block_ms))
        }
    }

    /// `true` when at least `voice_threshold` of the sub-frames are speech.
    ///
    /// `pcm` is 16-bit little-endian mono.
    ///
    /// # Errors
    ///
    /// [`VadError::InvalidSubBlock`] when `sub_block_ms` is not 10, 20 or 30,
    /// before anything is classified.
    pub fn is_voice(
        &mut self,
        pcm: &[u8],
        sample_rate: u32,
        sub_block_ms: u32,
    ) -> Result<bool, VadError> {
        Self::check_sub_block(sub_block_ms)?;

        let frame_samples = (sample_rate as usize * sub_block_ms as usize) / 1000;
        if frame_samples == 0 {
            return Err(VadError::UnsupportedSampleRate(sample_rate));
        }

        let mut total = 0_usize;
        let mut speech = 0_usize;
        let mut frame = Vec::with_capacity(frame_samples);

        for bytes in pcm.chunks_exact(frame_samples * 2) {
            frame.clear();
            frame.extend(
                bytes
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]])),
            );
            total += 1;
            if self.classifier.is_speech(&frame, sample_rate)? {
                speech += 1;
            }
        }

        if total == 0 {
            return Ok(false);
        }
        let fraction = speech as f32 / total as f32;
        Ok(fraction >= self.voice_threshold)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Any non-zero sample marks the frame as speech.
    struct LoudIsSpeech {
        calls: Arc<AtomicUsize>,
    }

    impl SpeechClassifier for LoudIsSpeech {
        fn is_speech(&mut self, frame: &[i16], _rate: u32) -> Result<bool, VadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(frame.iter().any(|&s| s != 0))
        }
    }

    fn detector() -> (VoiceActivityDetector, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let vad = VoiceActivityDetector::new(
            Box::new(LoudIsSpeech {
                calls: Arc::clone(&calls),
            }),
            0.9,
        );
        (vad, calls)
    }

    /// `speech` loud 10 ms frames followed by `silent` zero frames at 16 kHz.
    fn pcm(speech: usize, silent: usize) -> Vec<u8> {
        let mut samples = vec![1000_i16; speech * 160];
        samples.extend(vec![0_i16; silent * 160]);
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn all_silence_is_not_voice() {
        let (mut vad, _) = detector();
        assert!(!vad.is_voice(&pcm(0, 25), 16_000, 10).unwrap());
    }

    #[test]
    fn ninety_percent_speech_is_voice() {
        let (mut vad, _) = detector();
        assert!(vad.is_voice(&pcm(9, 1), 16_000, 10).unwrap());
        assert!(vad.is_voice(&pcm(10, 0), 16_000, 10).unwrap());
    }

    #[test]
    fn below_threshold_is_not_voice() {
        let (mut vad, _) = detector();
        assert!(!vad.is_voice(&pcm(8, 2), 16_000, 10).unwrap());
    }

    #[test]
    fn invalid_sub_block_rejected_before_classifying() {
        let (mut vad, calls) = detector();
        let err = vad.is_voice(&pcm(10, 0), 16_000, 15).unwrap_err();
        assert_eq!(err, VadError::InvalidSubBlock(15));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn block_shorter_than_sub_frame_is_not_voice() {
        let (mut vad, calls) = detector();
        let short: Vec<u8> = vec![0xff; 100];
        assert!(!vad.is_voice(&short, 16_000, 30).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn sub_frame_size_follows_duration() {
        let (mut vad, calls) = detector();
        // 250 ms block: 25 × 10 ms, 12 × 20 ms, 8 × 30 ms.
        vad.is_voice(&pcm(25, 0), 16_000, 20).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 12);
        vad.is_voice(&pcm(25, 0), 16_000, 30).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn earshot_hears_no_speech_in_digital_silence() {
        let mut vad = VoiceActivityDetector::from_config(&VadConfig::default());
        assert!(!vad.is_voice(&pcm(0, 25), 16_000, 10).unwrap());
    }

    #[test]
    fn earshot_rejects_odd_sample_rate() {
        let mut classifier = EarshotClassifier::new(2);
        let err = classifier.is_speech(&[0; 110], 11_025).unwrap_err();
        assert_eq!(err, VadError::UnsupportedSampleRate(11_025));
    }
}
