//! [`SessionOrchestrator`] — single-flight wake-word → recognition → intent →
//! actuation loop.
//!
//! # Flow
//!
//! ```text
//! WakewordDetected  (Idle)
//!   └─▶ AwaitingTranscript, recognizer.listen()   → enqueue TranscriptReady
//! TranscriptReady   (AwaitingTranscript)
//!   └─▶ AwaitingIntent, parser.parse(text)        → enqueue IntentReady
//! IntentReady       (AwaitingIntent)
//!   └─▶ Actuating, relay.switch(channels, mode)   → Idle
//! ```
//!
//! One event is handled at a time.  Any failure is logged and the machine
//! returns to `Idle`, ready for the next wake word.  The relay switch does
//! file I/O, so it runs on `tokio::task::spawn_blocking`.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use super::queue::{EventReceiver, EventSender, OrchestratorEvent};
use super::state::OrchestratorState;
use crate::context::AppContext;
use crate::indicator::StatusIndicator;
use crate::intent::{ActuationRequest, IntentError, IntentParser, IntentResult};
use crate::recognition::{RecognitionError, Recognizer};
use crate::relay::{RelayActuator, RelayError};

// ---------------------------------------------------------------------------
// OrchestratorError
// ---------------------------------------------------------------------------

/// Reason a cycle was aborted.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("recognition: {0}")]
    Recognition(#[from] RecognitionError),

    #[error("intent: {0}")]
    Intent(#[from] IntentError),

    #[error("relay: {0}")]
    Relay(#[from] RelayError),

    #[error("event queue closed")]
    QueueClosed,

    #[error("internal error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// SessionOrchestrator
// ---------------------------------------------------------------------------

pub struct SessionOrchestrator {
    state: OrchestratorState,
    recognizer: Arc<dyn Recognizer>,
    parser: Arc<dyn IntentParser>,
    relay: Arc<Mutex<Box<dyn RelayActuator>>>,
    channel_map: BTreeMap<String, u8>,
    indicator: Arc<dyn StatusIndicator>,
    events: EventSender,
}

impl SessionOrchestrator {
    /// `events` must feed the receiver later passed to [`run`](Self::run);
    /// the orchestrator enqueues its own follow-up events on it.
    pub fn new(
        ctx: &AppContext,
        recognizer: Arc<dyn Recognizer>,
        parser: Arc<dyn IntentParser>,
        relay: Box<dyn RelayActuator>,
        events: EventSender,
    ) -> Self {
        Self {
            state: OrchestratorState::Idle,
            recognizer,
            parser,
            relay: Arc::new(Mutex::new(relay)),
            channel_map: ctx.config.relay.channels.clone(),
            indicator: Arc::clone(&ctx.indicator),
            events,
        }
    }

    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    // -----------------------------------------------------------------------
    // Loops
    // -----------------------------------------------------------------------

    /// Handle events until the queue closes.  Since the orchestrator holds a
    /// sender itself, in practice this runs until the task is dropped.
    pub async fn run(&mut self, mut events: EventReceiver) {
        log::info!("orchestrator: waiting for wake word");
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        log::info!("orchestrator: event queue closed, shutting down");
    }

    /// Handle everything queued right now, including follow-ups enqueued
    /// along the way.  Returns the number of events handled.
    pub async fn process_pending(&mut self, events: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Some(event) = events.try_recv() {
            self.handle(event).await;
            handled += 1;
        }
        handled
    }

    /// Handle one event.  Never fails: errors reset the machine to `Idle`.
    pub async fn handle(&mut self, event: OrchestratorEvent) {
        let from = self.state;
        log::debug!("orchestrator: {} in {from}", event.kind());

        if let Err(e) = self.dispatch(event).await {
            log::error!("orchestrator: cycle aborted in {}: {e}", self.state);
            self.reset();
        }
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    async fn dispatch(&mut self, event: OrchestratorEvent) -> Result<(), OrchestratorError> {
        use OrchestratorEvent as E;
        use OrchestratorState as S;

        match (self.state, event) {
            (S::Idle, E::WakewordDetected) => self.on_wakeword().await,
            (S::AwaitingTranscript, E::TranscriptReady(text)) => self.on_transcript(text).await,
            (S::AwaitingIntent, E::IntentReady(result)) => self.on_intent(result).await,
            (state, E::WakewordDetected) => {
                log::info!("orchestrator: wake word ignored, busy ({state})");
                Ok(())
            }
            (state, event) => {
                log::warn!("orchestrator: {} unexpected in {state}, dropped", event.kind());
                Ok(())
            }
        }
    }

    async fn on_wakeword(&mut self) -> Result<(), OrchestratorError> {
        // Busy from the moment the session starts.
        self.state = OrchestratorState::AwaitingTranscript;
        self.indicator.wakeup();
        log::info!("orchestrator: wake word, listening");

        let transcript = self.recognizer.listen().await?;
        self.enqueue(OrchestratorEvent::TranscriptReady(transcript.text))
    }

    async fn on_transcript(&mut self, text: String) -> Result<(), OrchestratorError> {
        if text.trim().is_empty() {
            log::info!("orchestrator: nothing recognised");
            self.reset();
            return Ok(());
        }

        self.state = OrchestratorState::AwaitingIntent;
        self.indicator.think();
        log::info!("orchestrator: heard '{text}'");

        let result = self.parser.parse(&text).await?;
        self.enqueue(OrchestratorEvent::IntentReady(result))
    }

    async fn on_intent(&mut self, result: IntentResult) -> Result<(), OrchestratorError> {
        self.state = OrchestratorState::Actuating;

        let outcome = match ActuationRequest::from_intent(&result, &self.channel_map) {
            Some(req) => {
                self.indicator.speak();
                log::info!(
                    "orchestrator: '{}' → switch {:?} {}",
                    result.label(),
                    req.channels,
                    req.mode
                );
                self.switch(req).await
            }
            None => Ok(()),
        };

        // Back to Idle once the actuator returns, success or not.
        self.reset();
        outcome
    }

    async fn switch(&self, req: ActuationRequest) -> Result<(), OrchestratorError> {
        let relay = Arc::clone(&self.relay);
        let result = tokio::task::spawn_blocking(move || {
            let mut actuator = relay
                .lock()
                .map_err(|_| OrchestratorError::Internal("relay lock poisoned".into()))?;
            let state = actuator.switch(&req.channels, req.mode)?;
            Ok::<_, OrchestratorError>(state)
        })
        .await;

        match result {
            Ok(Ok(_state)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(OrchestratorError::Internal(e.to_string())),
        }
    }

    fn enqueue(&self, event: OrchestratorEvent) -> Result<(), OrchestratorError> {
        if self.events.send(event) {
            Ok(())
        } else {
            Err(OrchestratorError::QueueClosed)
        }
    }

    fn reset(&mut self) {
        self.state = OrchestratorState::Idle;
        self.indicator.off();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::indicator::RecordingIndicator;
    use crate::intent::Entity;
    use crate::orchestrator::queue::event_queue;
    use crate::recognition::{Transcript, TranscriptStatus};
    use crate::relay::{MemoryStateStore, RecordingBus, RelayBoard, RelayState, SwitchMode};
    use crate::audio::{AudioBlock, SpeechClassifier, VadError, VoiceActivityDetector};
    use crate::recognition::{MockConnector, StreamingRecognitionSession};
    use async_trait::async_trait;
    use tokio::sync::mpsc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // -----------------------------------------------------------------------
    // Test doubles
    // -----------------------------------------------------------------------

    /// Recognizer returning a fixed text, counting sessions.
    struct FixedRecognizer {
        text: String,
        calls: AtomicUsize,
    }

    impl FixedRecognizer {
        fn new(text: &str) -> Arc<Self> {
            Arc::new(Self {
                text: text.into(),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Recognizer for FixedRecognizer {
        async fn listen(&self) -> Result<Transcript, RecognitionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Transcript::new(
                self.text.clone(),
                TranscriptStatus::SilenceTimeout,
            ))
        }
    }

    struct DeadRecognizer;

    #[async_trait]
    impl Recognizer for DeadRecognizer {
        async fn listen(&self) -> Result<Transcript, RecognitionError> {
            Err(RecognitionError::Connection("connection refused".into()))
        }
    }

    /// Parser returning a fixed result, recording what it was asked.
    struct FixedParser {
        result: IntentResult,
        seen: Mutex<Vec<String>>,
    }

    impl FixedParser {
        fn new(result: IntentResult) -> Arc<Self> {
            Arc::new(Self {
                result,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IntentParser for FixedParser {
        async fn parse(&self, text: &str) -> Result<IntentResult, IntentError> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(self.result.clone())
        }
    }

    struct DeadParser;

    #[async_trait]
    impl IntentParser for DeadParser {
        async fn parse(&self, _text: &str) -> Result<IntentResult, IntentError> {
            Err(IntentError::Timeout)
        }
    }

    /// Relay that records every switch call and the thread it ran on.
    #[derive(Clone, Default)]
    struct SpyRelay {
        calls: Arc<Mutex<Vec<(Vec<u8>, SwitchMode)>>>,
        threads: Arc<Mutex<Vec<std::thread::ThreadId>>>,
    }

    impl SpyRelay {
        fn calls(&self) -> Vec<(Vec<u8>, SwitchMode)> {
            self.calls.lock().unwrap().clone()
        }

        fn threads(&self) -> Vec<std::thread::ThreadId> {
            self.threads.lock().unwrap().clone()
        }
    }

    impl RelayActuator for SpyRelay {
        fn switch(&mut self, channels: &[u8], mode: SwitchMode) -> Result<RelayState, RelayError> {
            self.threads.lock().unwrap().push(std::thread::current().id());
            self.calls.lock().unwrap().push((channels.to_vec(), mode));
            RelayState::ALL_OFF.with(channels, mode)
        }

        fn read(&self) -> Result<RelayState, RelayError> {
            Ok(RelayState::ALL_OFF)
        }
    }

    /// Recognizer running a real streaming session over prerecorded blocks.
    struct ReplayRecognizer {
        ctx: AppContext,
        connector: MockConnector,
        blocks: Mutex<Option<mpsc::UnboundedReceiver<AudioBlock>>>,
        // Held so the block source stays open; the session ends on silence.
        _source: mpsc::UnboundedSender<AudioBlock>,
    }

    impl ReplayRecognizer {
        fn new(ctx: AppContext, connector: MockConnector, blocks: Vec<AudioBlock>) -> Arc<Self> {
            let (tx, rx) = mpsc::unbounded_channel();
            for block in blocks {
                tx.send(block).unwrap();
            }
            Arc::new(Self {
                ctx,
                connector,
                blocks: Mutex::new(Some(rx)),
                _source: tx,
            })
        }
    }

    #[async_trait]
    impl Recognizer for ReplayRecognizer {
        async fn listen(&self) -> Result<Transcript, RecognitionError> {
            let mut rx = self
                .blocks
                .lock()
                .unwrap()
                .take()
                .expect("one session per replay");
            let vad = VoiceActivityDetector::new(Box::new(LoudIsSpeech), 0.9);
            let mut session =
                StreamingRecognitionSession::new(&self.ctx, Arc::new(self.connector.clone()), vad);
            session.run(&mut rx).await
        }
    }

    struct LoudIsSpeech;

    impl SpeechClassifier for LoudIsSpeech {
        fn is_speech(&mut self, frame: &[i16], _rate: u32) -> Result<bool, VadError> {
            Ok(frame.iter().any(|&s| s != 0))
        }
    }

    /// Parser answering `switch-on main` for "turn on ..." and `greet` otherwise.
    struct KeywordParser;

    #[async_trait]
    impl IntentParser for KeywordParser {
        async fn parse(&self, text: &str) -> Result<IntentResult, IntentError> {
            if text.starts_with("turn on") {
                Ok(switch_on_main())
            } else {
                Ok(IntentResult::new("greet", 0.5, vec![]))
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn switch_on_main() -> IntentResult {
        IntentResult::new(
            "switch-on",
            0.95,
            vec![Entity::new("light_name", "main")],
        )
    }

    struct Rig {
        orc: SessionOrchestrator,
        tx: EventSender,
        rx: EventReceiver,
        relay: SpyRelay,
        indicator: Arc<RecordingIndicator>,
    }

    fn rig_with(
        config: AppConfig,
        recognizer: Arc<dyn Recognizer>,
        parser: Arc<dyn IntentParser>,
    ) -> Rig {
        let indicator = Arc::new(RecordingIndicator::new());
        let ctx = AppContext::new(config, indicator.clone());
        let (tx, rx) = event_queue();
        let relay = SpyRelay::default();
        let orc = SessionOrchestrator::new(
            &ctx,
            recognizer,
            parser,
            Box::new(relay.clone()),
            tx.clone(),
        );
        Rig {
            orc,
            tx,
            rx,
            relay,
            indicator,
        }
    }

    fn rig(recognizer: Arc<dyn Recognizer>, parser: Arc<dyn IntentParser>) -> Rig {
        rig_with(AppConfig::default(), recognizer, parser)
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn event_sequence_switches_main_on_exactly_once() {
        let mut r = rig(
            FixedRecognizer::new("turn on the lights"),
            FixedParser::new(switch_on_main()),
        );

        r.orc.handle(OrchestratorEvent::WakewordDetected).await;
        assert_eq!(r.orc.state(), OrchestratorState::AwaitingTranscript);

        r.orc
            .handle(OrchestratorEvent::TranscriptReady(
                "turn on the lights".into(),
            ))
            .await;
        assert_eq!(r.orc.state(), OrchestratorState::AwaitingIntent);

        r.orc
            .handle(OrchestratorEvent::IntentReady(switch_on_main()))
            .await;

        assert_eq!(r.relay.calls(), vec![(vec![1], SwitchMode::On)]);
        assert_eq!(r.orc.state(), OrchestratorState::Idle);

        // The orchestrator's own follow-ups arrive while Idle and are dropped.
        r.orc.process_pending(&mut r.rx).await;
        assert_eq!(r.relay.calls().len(), 1);
        assert_eq!(r.orc.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn queued_cycle_runs_end_to_end() {
        let recognizer = FixedRecognizer::new("turn on the lights");
        let parser = FixedParser::new(switch_on_main());
        let mut r = rig(recognizer.clone(), parser.clone());

        assert!(r.tx.activate());
        let handled = r.orc.process_pending(&mut r.rx).await;

        assert_eq!(handled, 3);
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(parser.seen(), vec!["turn on the lights".to_string()]);
        assert_eq!(r.relay.calls(), vec![(vec![1], SwitchMode::On)]);
        assert_eq!(r.orc.state(), OrchestratorState::Idle);
        assert_eq!(
            r.indicator.calls(),
            vec!["wakeup", "think", "speak", "off"]
        );
    }

    #[tokio::test]
    async fn full_cycle_flips_the_main_relay_bit() {
        let indicator = Arc::new(RecordingIndicator::new());
        let ctx = AppContext::new(AppConfig::default(), indicator);
        let (tx, mut rx) = event_queue();
        let bus = RecordingBus::new();
        let store = MemoryStateStore::new();
        let board = RelayBoard::open(bus.clone(), store.clone()).unwrap();

        let mut orc = SessionOrchestrator::new(
            &ctx,
            FixedRecognizer::new("turn on the lights"),
            FixedParser::new(switch_on_main()),
            Box::new(board),
            tx.clone(),
        );

        tx.activate();
        orc.process_pending(&mut rx).await;

        assert_eq!(store.current().unwrap().bits(), [0, 1, 1, 1]);
        assert_eq!(bus.writes(), vec![0b0111_1111]);
    }

    #[tokio::test]
    async fn relay_switch_runs_off_the_runtime_thread() {
        let mut r = rig(
            FixedRecognizer::new("turn on the lights"),
            FixedParser::new(switch_on_main()),
        );

        r.tx.activate();
        r.orc.process_pending(&mut r.rx).await;

        let threads = r.relay.threads();
        assert_eq!(threads.len(), 1);
        assert_ne!(threads[0], std::thread::current().id());
    }

    #[tokio::test]
    async fn spoken_command_switches_the_main_light() {
        const BLOCK: usize = 4_000; // 250 ms @ 16 kHz
        let silence = || AudioBlock::from_samples(&vec![0_i16; BLOCK], 16_000, 1);
        let voice = || AudioBlock::from_samples(&vec![2_000_i16; BLOCK], 16_000, 1);

        // silence, speech, then 3 s of silence to close the session.
        let mut blocks = vec![silence(), silence()];
        blocks.extend((0..4).map(|_| voice()));
        blocks.extend((0..12).map(|_| silence()));

        let indicator = Arc::new(RecordingIndicator::new());
        let ctx = AppContext::new(AppConfig::default(), indicator);
        let connector = MockConnector::new("turn on the lights");
        let recognizer = ReplayRecognizer::new(ctx.clone(), connector.clone(), blocks);

        let bus = RecordingBus::new();
        let store = MemoryStateStore::new();
        let board = RelayBoard::open(bus.clone(), store.clone()).unwrap();
        let (tx, mut rx) = event_queue();
        let mut orc = SessionOrchestrator::new(
            &ctx,
            recognizer,
            Arc::new(KeywordParser),
            Box::new(board),
            tx.clone(),
        );

        tx.activate();
        orc.process_pending(&mut rx).await;

        assert_eq!(connector.connections(), 1);
        assert_eq!(connector.audio_frames(), 4);
        assert_eq!(store.current().unwrap().bits(), [0, 1, 1, 1]);
        assert_eq!(bus.writes(), vec![0b0111_1111]);
        assert_eq!(orc.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn wakeword_while_busy_is_dropped() {
        let recognizer = FixedRecognizer::new("lights off");
        let mut r = rig(recognizer.clone(), FixedParser::new(switch_on_main()));

        r.orc.handle(OrchestratorEvent::WakewordDetected).await;
        r.orc.handle(OrchestratorEvent::WakewordDetected).await;

        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.orc.state(), OrchestratorState::AwaitingTranscript);
    }

    #[tokio::test]
    async fn repeated_activations_queue_at_most_one() {
        let recognizer = FixedRecognizer::new("turn on the lights");
        let mut r = rig(recognizer.clone(), FixedParser::new(switch_on_main()));

        for _ in 0..10 {
            r.tx.activate();
        }
        r.orc.process_pending(&mut r.rx).await;

        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(r.relay.calls().len(), 1);
    }

    #[tokio::test]
    async fn recognition_failure_resets_to_idle() {
        let parser = FixedParser::new(switch_on_main());
        let mut r = rig(Arc::new(DeadRecognizer), parser.clone());

        r.tx.activate();
        r.orc.process_pending(&mut r.rx).await;

        assert_eq!(r.orc.state(), OrchestratorState::Idle);
        assert!(parser.seen().is_empty());
        assert!(r.relay.calls().is_empty());
        assert_eq!(r.indicator.calls().last(), Some(&"off"));

        // Ready for the next wake word.
        assert!(r.tx.activate());
    }

    #[tokio::test]
    async fn intent_failure_resets_to_idle() {
        let mut r = rig(FixedRecognizer::new("turn on"), Arc::new(DeadParser));

        r.tx.activate();
        r.orc.process_pending(&mut r.rx).await;

        assert_eq!(r.orc.state(), OrchestratorState::Idle);
        assert!(r.relay.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_transcript_skips_intent_parsing() {
        let parser = FixedParser::new(switch_on_main());
        let mut r = rig(FixedRecognizer::new("   "), parser.clone());

        r.tx.activate();
        r.orc.process_pending(&mut r.rx).await;

        assert_eq!(r.orc.state(), OrchestratorState::Idle);
        assert!(parser.seen().is_empty());
    }

    #[tokio::test]
    async fn non_switch_intent_is_a_no_op() {
        let greet = IntentResult::new("greet", 0.9, vec![]);
        let mut r = rig(FixedRecognizer::new("hello"), FixedParser::new(greet));

        r.tx.activate();
        r.orc.process_pending(&mut r.rx).await;

        assert!(r.relay.calls().is_empty());
        assert_eq!(r.orc.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn relay_failure_still_ends_idle() {
        let mut config = AppConfig::default();
        config.relay.channels.insert("main".into(), 9);

        let indicator = Arc::new(RecordingIndicator::new());
        let ctx = AppContext::new(config, indicator);
        let (tx, mut rx) = event_queue();
        let board = RelayBoard::open(RecordingBus::new(), MemoryStateStore::new()).unwrap();
        let mut orc = SessionOrchestrator::new(
            &ctx,
            FixedRecognizer::new("turn on the lights"),
            FixedParser::new(switch_on_main()),
            Box::new(board),
            tx.clone(),
        );

        tx.activate();
        orc.process_pending(&mut rx).await;
        assert_eq!(orc.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn stray_events_in_idle_are_ignored() {
        let parser = FixedParser::new(switch_on_main());
        let mut r = rig(FixedRecognizer::new("x"), parser.clone());

        r.orc
            .handle(OrchestratorEvent::TranscriptReady("turn on".into()))
            .await;
        r.orc
            .handle(OrchestratorEvent::IntentReady(switch_on_main()))
            .await;

        assert!(parser.seen().is_empty());
        assert!(r.relay.calls().is_empty());
        assert_eq!(r.orc.state(), OrchestratorState::Idle);
    }

    #[tokio::test]
    async fn run_returns_when_queue_closes() {
        let indicator = Arc::new(RecordingIndicator::new());
        let ctx = AppContext::new(AppConfig::default(), indicator);
        let (tx, rx) = event_queue();
        // Follow-ups go to a separate queue so `rx` closes once `tx` drops.
        let (side_tx, _side_rx) = event_queue();
        let mut orc = SessionOrchestrator::new(
            &ctx,
            FixedRecognizer::new("hello"),
            FixedParser::new(switch_on_main()),
            Box::new(SpyRelay::default()),
            side_tx,
        );

        tx.activate();
        drop(tx);
        orc.run(rx).await;
        assert_eq!(orc.state(), OrchestratorState::AwaitingTranscript);
    }
}
