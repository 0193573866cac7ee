//! Fixed-duration PCM blocks and the accumulator that produces them.
//!
//! The audio driver hands the capture callback buffers of whatever length it
//! likes.  [`BlockAssembler`] re-cuts that stream into blocks of exactly
//! `block_frames` frames so every [`AudioBlock`] covers the same duration.
//!
//! # Example
//!
//! ```rust
//! use voice_lights::audio::BlockAssembler;
//!
//! let mut asm = BlockAssembler::new(4, 16_000, 1);
//! let mut out = Vec::new();
//! asm.push(&[1, 2, 3], |b| out.push(b));
//! asm.push(&[4, 5, 6], |b| out.push(b));
//! assert_eq!(out.len(), 1);
//! assert_eq!(out[0].samples(), vec![1, 2, 3, 4]);
//! ```

use std::time::Duration;

// ---------------------------------------------------------------------------
// AudioBlock
// ---------------------------------------------------------------------------

/// An immutable chunk of 16-bit little-endian interleaved PCM.
///
/// Ownership moves into the block channel; the consumer reads it exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    pcm: Box<[u8]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBlock {
    /// Wrap raw little-endian 16-bit PCM bytes.
    pub fn from_pcm(pcm: Vec<u8>, sample_rate: u32, channels: u16) -> Self {
        Self {
            pcm: pcm.into_boxed_slice(),
            sample_rate,
            channels,
        }
    }

    /// Encode `samples` as little-endian bytes.
    pub fn from_samples(samples: &[i16], sample_rate: u32, channels: u16) -> Self {
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::from_pcm(pcm, sample_rate, channels)
    }

    /// Raw bytes as they go over the wire.
    pub fn pcm(&self) -> &[u8] {
        &self.pcm
    }

    /// Decode the bytes back to samples.  A trailing odd byte is ignored.
    pub fn samples(&self) -> Vec<i16> {
        self.pcm
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        let channels = usize::from(self.channels.max(1));
        self.pcm.len() / 2 / channels
    }

    /// Nominal duration derived from frame count and sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / f64::from(self.sample_rate))
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }
}

// ---------------------------------------------------------------------------
// BlockAssembler
// ---------------------------------------------------------------------------

/// Accumulates driver buffers and emits exact-size [`AudioBlock`]s.
///
/// Holds at most one partial block between calls.
pub struct BlockAssembler {
    pending: Vec<i16>,
    block_samples: usize,
    sample_rate: u32,
    channels: u16,
}

impl BlockAssembler {
    /// `block_frames` frames per emitted block.
    ///
    /// # Panics
    ///
    /// Panics if `block_frames == 0`.
    pub fn new(block_frames: usize, sample_rate: u32, channels: u16) -> Self {
        assert!(block_frames > 0, "block_frames must be > 0");
        let block_samples = block_frames * usize::from(channels.max(1));
        Self {
            pending: Vec::with_capacity(block_samples),
            block_samples,
            sample_rate,
            channels,
        }
    }

    /// Feed one driver buffer; `emit` is called once per completed block.
    pub fn push(&mut self, mut data: &[i16], mut emit: impl FnMut(AudioBlock)) {
        while !data.is_empty() {
            let room = self.block_samples - self.pending.len();
            let take = room.min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];

            if self.pending.len() == self.block_samples {
                emit(AudioBlock::from_samples(
                    &self.pending,
                    self.sample_rate,
                    self.channels,
                ));
                self.pending.clear();
            }
        }
    }

    /// Samples waiting for the next block.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
