//! Durable relay state.
//!
//! The board remembers what it last wrote so `read()` never has to query the
//! hardware, and so a restart comes back with the lights as they were.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{RelayError, RelayState};

/// Where relay state survives between runs.
pub trait StateStore: Send {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<RelayState>, RelayError>;
    fn save(&mut self, state: RelayState) -> Result<(), RelayError>;
}

// ---------------------------------------------------------------------------
// JsonStateStore
// ---------------------------------------------------------------------------

/// Keeps the state as a JSON array (`[1,1,1,1]`) in a single file.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<Option<RelayState>, RelayError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&mut self, state: RelayState) -> Result<(), RelayError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string(&state)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStateStore
// ---------------------------------------------------------------------------

/// In-memory store.  Clones share the same slot, so a test can keep one
/// clone and inspect what the board persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    slot: Arc<Mutex<Option<RelayState>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: RelayState) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(state))),
        }
    }

    /// Last saved state.
    pub fn current(&self) -> Option<RelayState> {
        self.slot.lock().ok().and_then(|s| *s)
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<RelayState>, RelayError> {
        Ok(self.current())
    }

    fn save(&mut self, state: RelayState) -> Result<(), RelayError> {
        if let Ok(mut slot) = self.slot.lock() {
            *slot = Some(state);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
