//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::AppPaths;
use crate::audio::vad::{SUPPORTED_SAMPLE_RATES, VALID_SUB_BLOCK_MS};
use crate::relay::{MAX_CHANNEL, MIN_CHANNEL};

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// A setting that cannot be used as-is.  Raised before any work starts.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required URI: {0}")]
    MissingUri(&'static str),

    #[error("VAD sub-block must be 10, 20 or 30 ms, got {0}")]
    InvalidSubBlock(u32),

    #[error("VAD aggressiveness must be within 0..=3, got {0}")]
    InvalidAggressiveness(u8),

    #[error("light '{name}' is mapped to channel {channel}, outside 1..=4")]
    InvalidChannel { name: String, channel: u8 },

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("sample rate must be 8000, 16000, 32000 or 48000 Hz, got {0}")]
    UnsupportedSampleRate(u32),

    #[error("capture must be mono, got {0} channels")]
    NotMono(u16),
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Microphone capture settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Capture sample rate in Hz; also announced to the recognition service.
    pub sample_rate: u32,
    /// Input device: `None` = system default, a number = device index,
    /// anything else = substring of the device name.
    pub device: Option<String>,
    /// Frames per delivered block (4000 frames = 250 ms at 16 kHz).
    pub block_size: u32,
    /// Interleaved channels requested from the device.
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            device: None,
            block_size: 4_000,
            channels: 1,
        }
    }
}

// ---------------------------------------------------------------------------
// VadConfig
// ---------------------------------------------------------------------------

/// Voice-activity detection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VadConfig {
    /// Classifier aggressiveness, 0 (least) to 3 (most aggressive).
    pub aggressiveness: u8,
    /// Sub-frame duration handed to the classifier: 10, 20 or 30 ms.
    pub sub_block_ms: u32,
    /// Fraction of speech sub-frames required to call a block voice.
    pub voice_threshold: f32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            aggressiveness: 2,
            sub_block_ms: 10,
            voice_threshold: 0.9,
        }
    }
}

// ---------------------------------------------------------------------------
// RecognitionConfig
// ---------------------------------------------------------------------------

/// Remote speech-recognition service and session timeout policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Websocket URI of the recognition service.
    pub uri: String,
    /// A session ends once this much consecutive silence has been seen.
    pub max_silence_secs: f32,
    /// A session ends once this much voice has been streamed.
    pub max_voice_secs: f32,
    /// Upper bound on any single wait for a server message.
    pub reply_timeout_secs: u64,
    /// Window length used by batch replay of recorded files.
    pub replay_window_secs: f32,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            uri: "ws://localhost:2700".into(),
            max_silence_secs: 3.0,
            max_voice_secs: 3.0,
            reply_timeout_secs: 10,
            replay_window_secs: 0.2,
        }
    }
}

// ---------------------------------------------------------------------------
// IntentConfig
// ---------------------------------------------------------------------------

/// Remote intent/entity parsing service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    /// HTTP endpoint accepting `POST {"text": …}`.
    pub uri: String,
    /// Maximum seconds to wait for a response.
    pub timeout_secs: u64,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:5000".into(),
            timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// RelayConfig
// ---------------------------------------------------------------------------

/// Light name → relay channel table and state persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Static name → 1-based channel mapping used to resolve entities.
    pub channels: BTreeMap<String, u8>,
    /// Where the channel state is persisted; `None` = platform data dir.
    pub state_file: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        let channels = [("main", 1), ("l1", 2), ("l2", 3), ("l3", 4)]
            .into_iter()
            .map(|(name, ch)| (name.to_string(), ch))
            .collect();
        Self {
            channels,
            state_file: None,
        }
    }
}

impl RelayConfig {
    /// Resolved location of the relay state file.
    pub fn state_path(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| AppPaths::new().relay_state_file)
    }
}

// ---------------------------------------------------------------------------
// WakewordConfig
// ---------------------------------------------------------------------------

/// Precise-compatible wake-word engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WakewordConfig {
    /// Engine executable.
    pub engine_path: PathBuf,
    /// Wake-word model file handed to the engine.
    pub model_path: PathBuf,
    /// 0.0 – 1.0; higher fires more easily.
    pub sensitivity: f32,
    /// Consecutive activated chunks required to fire.
    pub trigger_level: u32,
    /// Bytes of 16-bit PCM per engine chunk.
    pub chunk_size: usize,
}

impl Default for WakewordConfig {
    fn default() -> Self {
        Self {
            engine_path: PathBuf::from("precise-engine/precise-engine"),
            model_path: PathBuf::from("models/hotword.pb"),
            sensitivity: 0.5,
            trigger_level: 3,
            chunk_size: 2048,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub recognition: RecognitionConfig,
    pub intent: IntentConfig,
    pub relay: RelayConfig,
    pub wakeword: WakewordConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        Ok(config)
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check every value the core consumes.  Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recognition.uri.trim().is_empty() {
            return Err(ConfigError::MissingUri("recognition.uri"));
        }
        if self.intent.uri.trim().is_empty() {
            return Err(ConfigError::MissingUri("intent.uri"));
        }
        if !VALID_SUB_BLOCK_MS.contains(&self.vad.sub_block_ms) {
            return Err(ConfigError::InvalidSubBlock(self.vad.sub_block_ms));
        }
        if self.vad.aggressiveness > 3 {
            return Err(ConfigError::InvalidAggressiveness(self.vad.aggressiveness));
        }
        if !SUPPORTED_SAMPLE_RATES.contains(&self.audio.sample_rate) {
            return Err(ConfigError::UnsupportedSampleRate(self.audio.sample_rate));
        }
        if self.audio.channels != 1 {
            return Err(ConfigError::NotMono(self.audio.channels));
        }
        if self.audio.block_size == 0 {
            return Err(ConfigError::NotPositive("audio.block_size"));
        }
        if self.recognition.max_silence_secs <= 0.0 {
            return Err(ConfigError::NotPositive("recognition.max_silence_secs"));
        }
        if self.recognition.max_voice_secs <= 0.0 {
            return Err(ConfigError::NotPositive("recognition.max_voice_secs"));
        }
        if let Some((name, &channel)) = self
            .relay
            .channels
            .iter()
            .find(|(_, &ch)| !(MIN_CHANNEL..=MAX_CHANNEL).contains(&ch))
        {
            return Err(ConfigError::InvalidChannel {
                name: name.clone(),
                channel,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.recognition.uri, "ws://localhost:2700");
    }

    #[test]
    fn load_uses_the_platform_settings_file() {
        let path = AppPaths::new().settings_file;
        let loaded = AppConfig::load().expect("load");
        let direct = AppConfig::load_from(&path).expect("load_from");
        assert_eq!(loaded.recognition.uri, direct.recognition.uri);
        assert_eq!(loaded.relay.channels, direct.relay.channels);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.audio.block_size, 4_000);
        assert_eq!(cfg.audio.channels, 1);
        assert!(cfg.audio.device.is_none());
        assert_eq!(cfg.vad.sub_block_ms, 10);
        assert!((cfg.vad.voice_threshold - 0.9).abs() < f32::EPSILON);
        assert!((cfg.recognition.max_silence_secs - 3.0).abs() < f32::EPSILON);
        assert!((cfg.recognition.max_voice_secs - 3.0).abs() < f32::EPSILON);
        assert_eq!(cfg.relay.channels.get("main"), Some(&1));
        assert_eq!(cfg.relay.channels.len(), 4);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn modified_values_survive_save_and_load() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.audio.device = Some("ReSpeaker".into());
        cfg.recognition.uri = "ws://asr.local:2700".into();
        cfg.recognition.max_silence_secs = 5.0;
        cfg.relay.channels.insert("porch".into(), 3);

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.audio.device.as_deref(), Some("ReSpeaker"));
        assert_eq!(loaded.recognition.uri, "ws://asr.local:2700");
        assert!((loaded.recognition.max_silence_secs - 5.0).abs() < f32::EPSILON);
        assert_eq!(loaded.relay.channels.get("porch"), Some(&3));
    }

    /// Sections absent from the file fall back to their defaults.
    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[vad]\naggressiveness = 3\n").unwrap();

        let cfg = AppConfig::load_from(&path).expect("load");
        assert_eq!(cfg.vad.aggressiveness, 3);
        assert_eq!(cfg.vad.sub_block_ms, 10);
        assert_eq!(cfg.intent.uri, "http://localhost:5000");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = AppConfig::default();
        cfg.vad.sub_block_ms = 15;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidSubBlock(15)));

        let mut cfg = AppConfig::default();
        cfg.intent.uri = "  ".into();
        assert_eq!(cfg.validate(), Err(ConfigError::MissingUri("intent.uri")));

        let mut cfg = AppConfig::default();
        cfg.relay.channels.insert("garage".into(), 5);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidChannel { channel: 5, .. })
        ));

        let mut cfg = AppConfig::default();
        cfg.audio.channels = 2;
        assert_eq!(cfg.validate(), Err(ConfigError::NotMono(2)));

        let mut cfg = AppConfig::default();
        cfg.audio.sample_rate = 44_100;
        assert_eq!(cfg.validate(), Err(ConfigError::UnsupportedSampleRate(44_100)));

        for rate in SUPPORTED_SAMPLE_RATES {
            let mut cfg = AppConfig::default();
            cfg.audio.sample_rate = rate;
            assert!(cfg.validate().is_ok(), "{rate} Hz");
        }
    }
}
