//! Relay-switched lights.
//!
//! Four 1-based channels wired active-low: a channel's state bit is `0`
//! while the light is ON and `1` while it is OFF.  [`RelayActuator`] is the
//! narrow contract the orchestrator drives; [`RelayBoard`] implements it over
//! a raw byte [`RelayBus`] and a durable [`StateStore`].
//!
//! ```text
//! switch([1, 3], On)
//!   state  [1,1,1,1] → [0,1,0,1]
//!   mask   0b0101_1111 → bus
//!   store  [0,1,0,1]
//! ```

pub mod board;
pub mod store;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use board::{LogBus, RelayBoard, RelayBus};
// test-only re-export for the orchestrator tests
#[cfg(test)]
pub use board::RecordingBus;
pub use store::{JsonStateStore, MemoryStateStore, StateStore};

/// Lowest valid channel index.
pub const MIN_CHANNEL: u8 = 1;
/// Highest valid channel index.
pub const MAX_CHANNEL: u8 = 4;

const CHANNEL_COUNT: usize = MAX_CHANNEL as usize;

// ---------------------------------------------------------------------------
// RelayError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RelayError {
    /// Configuration error: channel index outside 1..=4.
    #[error("invalid relay channel {0} (valid: 1..=4)")]
    InvalidChannel(u8),

    /// Configuration error: mode other than 0 (off) or 1 (on).
    #[error("invalid switch mode {0} (valid: 0 = off, 1 = on)")]
    InvalidMode(u8),

    #[error("relay bus write failed: {0}")]
    Bus(String),

    #[error("relay state I/O failed: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("relay state file is corrupt: {0}")]
    StoreFormat(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// SwitchMode
// ---------------------------------------------------------------------------

/// Target of a switch request.  Numerically `Off = 0`, `On = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchMode {
    Off,
    On,
}

impl SwitchMode {
    pub fn as_u8(self) -> u8 {
        match self {
            SwitchMode::Off => 0,
            SwitchMode::On => 1,
        }
    }

    /// State bit a channel takes in this mode (active-low wiring).
    pub fn state_bit(self) -> u8 {
        self.as_u8() ^ 1
    }
}

impl TryFrom<u8> for SwitchMode {
    type Error = RelayError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SwitchMode::Off),
            1 => Ok(SwitchMode::On),
            other => Err(RelayError::InvalidMode(other)),
        }
    }
}

impl std::fmt::Display for SwitchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SwitchMode::Off => "off",
            SwitchMode::On => "on",
        })
    }
}

// ---------------------------------------------------------------------------
// RelayState
// ---------------------------------------------------------------------------

/// One state bit per channel, channel 1 first.  `0` = ON, `1` = OFF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelayState([u8; CHANNEL_COUNT]);

impl RelayState {
    /// Every light off.
    pub const ALL_OFF: RelayState = RelayState([1; CHANNEL_COUNT]);

    pub fn from_bits(bits: [u8; CHANNEL_COUNT]) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> [u8; CHANNEL_COUNT] {
        self.0
    }

    /// `None` for an out-of-range channel.
    pub fn is_on(&self, channel: u8) -> Option<bool> {
        index(channel).map(|i| self.0[i] == 0)
    }

    /// Copy of `self` with `channels` set to `mode`.
    ///
    /// # Errors
    ///
    /// [`RelayError::InvalidChannel`] on the first out-of-range channel;
    /// nothing is changed in that case.
    pub fn with(&self, channels: &[u8], mode: SwitchMode) -> Result<Self, RelayError> {
        validate_channels(channels)?;
        let mut next = *self;
        for &channel in channels {
            if let Some(i) = index(channel) {
                next.0[i] = mode.state_bit();
            }
        }
        Ok(next)
    }

    /// Byte written to the bus: state bits (channel 1 = MSB of the high
    /// nibble) followed by `0b1111`.
    pub fn mask(&self) -> u8 {
        let high = self
            .0
            .iter()
            .fold(0_u8, |acc, &bit| (acc << 1) | (bit & 1));
        (high << 4) | 0b1111
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::ALL_OFF
    }
}

impl std::fmt::Display for RelayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, bit) in self.0.iter().enumerate() {
            let label = if *bit == 0 { "on" } else { "off" };
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{label}", i + 1)?;
        }
        Ok(())
    }
}

fn index(channel: u8) -> Option<usize> {
    (MIN_CHANNEL..=MAX_CHANNEL)
        .contains(&channel)
        .then(|| usize::from(channel - MIN_CHANNEL))
}

/// Fail on the first channel outside `MIN_CHANNEL..=MAX_CHANNEL`.
pub fn validate_channels(channels: &[u8]) -> Result<(), RelayError> {
    match channels.iter().find(|&&c| index(c).is_none()) {
        Some(&bad) => Err(RelayError::InvalidChannel(bad)),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// RelayActuator
// ---------------------------------------------------------------------------

/// Switch and read relay channels.
pub trait RelayActuator: Send {
    /// Set every channel in `channels` to `mode` and return the new state.
    fn switch(&mut self, channels: &[u8], mode: SwitchMode) -> Result<RelayState, RelayError>;

    /// Current state without touching the hardware.
    fn read(&self) -> Result<RelayState, RelayError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
