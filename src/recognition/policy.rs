//! Silence / voice budget of a live session.
//!
//! Durations are counted in whole sample frames so the stop decision never
//! drifts with floating-point accumulation.  A limit of `secs` at `rate` Hz
//! is reached once `ceil(secs × rate)` frames have been counted; with
//! fixed-size blocks of `d` seconds that is exactly `ceil(secs / d)` blocks.
//!
//! * voice block:   silence := 0,  voice += block
//! * silence block: silence += block, voice unchanged

/// What the session should do after a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    Continue,
    SilenceTimeout,
    VoiceLimit,
}

#[derive(Debug, Clone)]
pub struct TimeoutPolicy {
    sample_rate: u32,
    max_silence_frames: u64,
    max_voice_frames: u64,
    silence_frames: u64,
    voice_frames: u64,
}

impl TimeoutPolicy {
    pub fn new(max_silence_secs: f32, max_voice_secs: f32, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            max_silence_frames: frames_for(max_silence_secs, sample_rate),
            max_voice_frames: frames_for(max_voice_secs, sample_rate),
            silence_frames: 0,
            voice_frames: 0,
        }
    }

    /// Account for one block of `frames` frames.
    pub fn observe(&mut self, is_voice: bool, frames: usize) -> PolicyDecision {
        let frames = frames as u64;
        if is_voice {
            self.silence_frames = 0;
            self.voice_frames = self.voice_frames.saturating_add(frames);
        } else {
            self.silence_frames = self.silence_frames.saturating_add(frames);
        }

        if self.silence_frames >= self.max_silence_frames {
            PolicyDecision::SilenceTimeout
        } else if self.voice_frames >= self.max_voice_frames {
            PolicyDecision::VoiceLimit
        } else {
            PolicyDecision::Continue
        }
    }

    /// Consecutive silence so far.
    pub fn silence_seconds(&self) -> f32 {
        self.seconds(self.silence_frames)
    }

    /// Voice streamed so far.
    pub fn voice_seconds(&self) -> f32 {
        self.seconds(self.voice_frames)
    }

    fn seconds(&self, frames: u64) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        (frames as f64 / f64::from(self.sample_rate)) as f32
    }
}

/// `ceil(secs × rate)`, with `secs` taken to the microsecond.  Budgets too
/// large to count saturate at `u64::MAX` frames, i.e. never reached.
fn frames_for(secs: f32, sample_rate: u32) -> u64 {
    let micros = (f64::from(secs.max(0.0)) * 1e6).round() as u64;
    match micros.checked_mul(u64::from(sample_rate)) {
        Some(scaled) => scaled.div_ceil(1_000_000),
        None => u64::MAX,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;
    const BLOCK: usize = 4_000; // 250 ms

    #[test]
    fn limit_frames_round_up() {
        assert_eq!(frames_for(3.0, RATE), 48_000);
        assert_eq!(frames_for(0.3, RATE), 4_800);
        assert_eq!(frames_for(0.1, 44_100), 4_410);
        assert_eq!(frames_for(0.00001, RATE), 1);
    }

    #[test]
    fn silence_stops_after_ceil_blocks() {
        for (max_secs, expected_blocks) in [(3.0_f32, 12), (1.1, 5), (0.25, 1), (0.3, 2)] {
            let mut policy = TimeoutPolicy::new(max_secs, 3.0, RATE);
            let mut blocks = 0;
            loop {
                blocks += 1;
                if policy.observe(false, BLOCK) == PolicyDecision::SilenceTimeout {
                    break;
                }
                assert!(blocks < 100, "never timed out");
            }
            assert_eq!(blocks, expected_blocks, "max_silence_secs = {max_secs}");
        }
    }

    #[test]
    fn voice_limit_after_enough_voice() {
        let mut policy = TimeoutPolicy::new(3.0, 1.0, RATE);
        assert_eq!(policy.observe(true, BLOCK), PolicyDecision::Continue);
        assert_eq!(policy.observe(true, BLOCK), PolicyDecision::Continue);
        assert_eq!(policy.observe(false, BLOCK), PolicyDecision::Continue);
        assert_eq!(policy.observe(true, BLOCK), PolicyDecision::Continue);
        assert_eq!(policy.observe(true, BLOCK), PolicyDecision::VoiceLimit);
    }

    #[test]
    fn huge_voice_budget_never_stops_the_session() {
        let mut policy = TimeoutPolicy::new(3.0, 1.0e12, RATE);
        for _ in 0..100 {
            assert_eq!(policy.observe(true, BLOCK), PolicyDecision::Continue);
        }
        assert_eq!(frames_for(1.0e12, RATE), u64::MAX);
        assert_eq!(frames_for(f32::MAX, 48_000), u64::MAX);
    }

    #[test]
    fn voice_resets_silence_but_silence_keeps_voice() {
        let mut policy = TimeoutPolicy::new(10.0, 10.0, RATE);
        let mut last_voice = 0.0_f32;

        for i in 0..20 {
            let is_voice = i % 2 == 0;
            policy.observe(is_voice, BLOCK);

            if is_voice {
                assert_eq!(policy.silence_seconds(), 0.0);
            } else {
                assert!((policy.silence_seconds() - 0.25).abs() < 1e-6);
            }
            assert!(policy.voice_seconds() >= last_voice);
            last_voice = policy.voice_seconds();
        }
        assert!((policy.voice_seconds() - 2.5).abs() < 1e-6);
    }
}
