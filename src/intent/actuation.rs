//! Intent → relay actuation.
//!
//! | label        | mode |
//! |--------------|------|
//! | `switch-on`  | On   |
//! | `switch-off` | Off  |
//! | anything else| no actuation |
//!
//! `light_name` entities are resolved through the static name → channel
//! table; unknown names are skipped.  An intent without any `light_name`
//! entity targets the `main` light.

use std::collections::BTreeMap;

use super::IntentResult;
use crate::relay::SwitchMode;

/// Entity type naming a light.
pub const LIGHT_ENTITY: &str = "light_name";
/// Light used when the utterance names none.
pub const DEFAULT_LIGHT: &str = "main";

/// Channels to switch and the mode to switch them to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActuationRequest {
    /// Sorted, without duplicates.
    pub channels: Vec<u8>,
    pub mode: SwitchMode,
}

/// Mode an intent label asks for, if it asks for one.
pub fn mode_for_label(label: &str) -> Option<SwitchMode> {
    match label {
        "switch-on" => Some(SwitchMode::On),
        "switch-off" => Some(SwitchMode::Off),
        _ => None,
    }
}

impl ActuationRequest {
    /// Derive the request from `result` using `channel_map`.
    ///
    /// `None` when the label is not a switch intent or no named light maps to
    /// a channel.
    pub fn from_intent(result: &IntentResult, channel_map: &BTreeMap<String, u8>) -> Option<Self> {
        let Some(mode) = mode_for_label(result.label()) else {
            log::info!("actuation: intent '{}' needs no relay action", result.label());
            return None;
        };

        let mut names: Vec<&str> = result.values_of(LIGHT_ENTITY).collect();
        if names.is_empty() {
            names.push(DEFAULT_LIGHT);
        }

        let mut channels: Vec<u8> = names
            .into_iter()
            .filter_map(|name| {
                let key = name.trim().to_lowercase();
                let channel = channel_map.get(&key).copied();
                if channel.is_none() {
                    log::warn!("actuation: unknown light '{name}', skipping");
                }
                channel
            })
            .collect();
        channels.sort_unstable();
        channels.dedup();

        if channels.is_empty() {
            log::warn!("actuation: no known light in intent '{}'", result.label());
            return None;
        }
        Some(Self { channels, mode })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
