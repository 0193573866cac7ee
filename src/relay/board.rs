//! [`RelayBoard`]: validate → compute state → write mask → persist.

use super::{RelayActuator, RelayError, RelayState, StateStore, SwitchMode};

/// Raw byte sink in front of the relay hardware.
pub trait RelayBus: Send {
    fn write(&mut self, mask: u8) -> Result<(), RelayError>;
}

/// Bus that only logs the mask it would write.
#[derive(Debug, Default)]
pub struct LogBus;

impl RelayBus for LogBus {
    fn write(&mut self, mask: u8) -> Result<(), RelayError> {
        log::info!("relay: bus <- {mask:#010b}");
        Ok(())
    }
}

/// Bus that records every mask; clones share the record.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingBus {
    writes: std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
}

#[cfg(test)]
impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<u8> {
        self.writes.lock().map(|w| w.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl RelayBus for RecordingBus {
    fn write(&mut self, mask: u8) -> Result<(), RelayError> {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push(mask);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// RelayBoard
// ---------------------------------------------------------------------------

/// Four-channel active-low relay board.
pub struct RelayBoard<B: RelayBus, S: StateStore> {
    bus: B,
    store: S,
    state: RelayState,
}

impl<B: RelayBus, S: StateStore> RelayBoard<B, S> {
    /// Restore the persisted state, or initialise the store with all-off.
    ///
    /// Nothing is written to the bus until the first switch.
    pub fn open(bus: B, mut store: S) -> Result<Self, RelayError> {
        let state = match store.load()? {
            Some(state) => state,
            None => {
                store.save(RelayState::ALL_OFF)?;
                RelayState::ALL_OFF
            }
        };
        log::debug!("relay: opened with state {state}");
        Ok(Self { bus, store, state })
    }
}

impl<B: RelayBus, S: StateStore> RelayActuator for RelayBoard<B, S> {
    fn switch(&mut self, channels: &[u8], mode: SwitchMode) -> Result<RelayState, RelayError> {
        let next = match self.state.with(channels, mode) {
            Ok(next) => next,
            Err(e) => {
                log::warn!("relay: rejected switch {channels:?} {mode}: {e}");
                return Err(e);
            }
        };

        self.bus.write(next.mask())?;
        // The hardware now holds `next`, whether or not it can be persisted.
        self.state = next;
        if let Err(e) = self.store.save(next) {
            log::error!("relay: switched to {next} but could not persist it: {e}");
            return Err(e);
        }

        log::info!("relay: switched {channels:?} {mode} → {next}");
        Ok(next)
    }

    fn read(&self) -> Result<RelayState, RelayError> {
        Ok(self.state)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
