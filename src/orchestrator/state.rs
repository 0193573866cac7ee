//! Orchestrator state machine.

/// States of the wake-word → recognition → intent → actuation cycle.
///
/// ```text
/// Idle ──WakewordDetected──▶ AwaitingTranscript   (set when the session starts)
///      ──TranscriptReady───▶ AwaitingIntent
///      ──IntentReady───────▶ Actuating ──relay returns──▶ Idle
/// any state ──error──▶ Idle
/// ```
///
/// There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrchestratorState {
    /// Waiting for the wake word.
    #[default]
    Idle,

    /// A recognition session is running.
    AwaitingTranscript,

    /// The transcript is with the intent service.
    AwaitingIntent,

    /// The relay actuator is being driven.
    Actuating,
}

impl OrchestratorState {
    /// `true` everywhere except `Idle`.
    ///
    /// ```
    /// use voice_lights::orchestrator::OrchestratorState;
    ///
    /// assert!(!OrchestratorState::Idle.is_busy());
    /// assert!(OrchestratorState::AwaitingTranscript.is_busy());
    /// assert!(OrchestratorState::AwaitingIntent.is_busy());
    /// assert!(OrchestratorState::Actuating.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        !matches!(self, OrchestratorState::Idle)
    }

    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            OrchestratorState::Idle => "Idle",
            OrchestratorState::AwaitingTranscript => "AwaitingTranscript",
            OrchestratorState::AwaitingIntent => "AwaitingIntent",
            OrchestratorState::Actuating => "Actuating",
        }
    }
}

impl std::fmt::Display for OrchestratorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
