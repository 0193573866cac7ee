//! Turns a stream of per-chunk wake-word probabilities into activations.

/// Chunks of cool-down after an activation, at the 2048-byte reference chunk.
const COOLDOWN_REFERENCE: i64 = 8 * 2048;

/// Activation counter in the Precise runner's style.
///
/// A chunk counts as activated when its probability exceeds
/// `1 - sensitivity`.  The detector fires once more than `trigger_level`
/// activated chunks have been seen without the counter decaying to zero, then
/// holds off for `8 * 2048 / chunk_size` chunks.
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    sensitivity: f32,
    trigger_level: i64,
    cooldown: i64,
    activation: i64,
}

impl TriggerDetector {
    pub fn new(chunk_size: usize, sensitivity: f32, trigger_level: u32) -> Self {
        let chunk = chunk_size.max(1) as i64;
        Self {
            sensitivity: sensitivity.clamp(0.0, 1.0),
            trigger_level: i64::from(trigger_level),
            cooldown: COOLDOWN_REFERENCE / chunk,
            activation: 0,
        }
    }

    /// Feed one probability; `true` when the wake word fires.
    pub fn update(&mut self, prob: f32) -> bool {
        let chunk_activated = prob > 1.0 - self.sensitivity;

        if chunk_activated || self.activation < 0 {
            self.activation += 1;
            let fired = self.activation > self.trigger_level;
            if fired || (chunk_activated && self.activation < 0) {
                self.activation = -self.cooldown;
            }
            return fired;
        }

        if self.activation > 0 {
            self.activation -= 1;
        }
        false
    }

    pub fn reset(&mut self) {
        self.activation = 0;
    }
}
