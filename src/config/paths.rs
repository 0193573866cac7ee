//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   macOS:   ~/Library/Application Support/voice-lights/
//!   Linux:   ~/.config/voice-lights/
//!
//! Data dir (durable relay state):
//!   macOS:   ~/Library/Application Support/voice-lights/
//!   Linux:   ~/.local/share/voice-lights/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for files that must survive a restart.
    pub data_dir: PathBuf,
    /// Full path to the persisted relay channel state.
    pub relay_state_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voice-lights";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let relay_state_file = data_dir.join("relay-state.json");

        Self {
            config_dir,
            settings_file,
            data_dir,
            relay_state_file,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
