//! [`StreamingRecognitionSession`] — one bounded, VAD-gated listening session.
//!
//! # Flow
//!
//! ```text
//! Connecting ─ connect, send {"config": …}
//! Listening  ─ loop: block = rx.recv()
//!                    voice?   → send pcm, await reply (partial logged)
//!                    policy   → Continue | SilenceTimeout | VoiceLimit
//! Closing    ─ discard queued blocks, send {"eof":1}, await final text
//! Closed
//! ```
//!
//! The block receive and the network round-trips are the only suspension
//! points.  There is no external cancel: a session ends on its silence or
//! voice budget, when the audio source closes, or on a transport failure.
//! Transport failures abandon the session; malformed replies do not.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use super::policy::{PolicyDecision, TimeoutPolicy};
use super::transport::{RecognitionConnection, RecognitionConnector};
use super::wire::{self, Reply};
use super::{RecognitionError, Transcript, TranscriptStatus};
use crate::audio::{AudioBlock, VoiceActivityDetector};
use crate::context::AppContext;
use crate::indicator::StatusIndicator;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Connecting,
    Listening,
    Closing,
    Closed,
}

// ---------------------------------------------------------------------------
// StreamingRecognitionSession
// ---------------------------------------------------------------------------

pub struct StreamingRecognitionSession {
    connector: Arc<dyn RecognitionConnector>,
    vad: VoiceActivityDetector,
    indicator: Arc<dyn StatusIndicator>,
    sample_rate: u32,
    sub_block_ms: u32,
    policy: TimeoutPolicy,
    state: SessionState,
    blocks_sent: usize,
}

impl StreamingRecognitionSession {
    /// Session settings (sample rate, VAD sub-block, silence/voice budget)
    /// are read from `ctx.config`.
    pub fn new(
        ctx: &AppContext,
        connector: Arc<dyn RecognitionConnector>,
        vad: VoiceActivityDetector,
    ) -> Self {
        let cfg = &ctx.config;
        Self {
            connector,
            vad,
            indicator: Arc::clone(&ctx.indicator),
            sample_rate: cfg.audio.sample_rate,
            sub_block_ms: cfg.vad.sub_block_ms,
            policy: TimeoutPolicy::new(
                cfg.recognition.max_silence_secs,
                cfg.recognition.max_voice_secs,
                cfg.audio.sample_rate,
            ),
            state: SessionState::Connecting,
            blocks_sent: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Voice blocks streamed to the service so far.
    pub fn blocks_sent(&self) -> usize {
        self.blocks_sent
    }

    pub fn silence_seconds(&self) -> f32 {
        self.policy.silence_seconds()
    }

    pub fn voice_seconds(&self) -> f32 {
        self.policy.voice_seconds()
    }

    /// Run the session to completion, consuming blocks from `blocks`.
    ///
    /// Ends in [`SessionState::Closed`] whatever the outcome.  Blocks still
    /// queued when the session stops are discarded.
    ///
    /// # Errors
    ///
    /// * [`RecognitionError::Vad`] for an invalid sub-block, before connecting.
    /// * [`RecognitionError::Connection`] / [`RecognitionError::ReplyTimeout`]
    ///   on transport failure; no partial transcript is returned.
    pub async fn run(
        &mut self,
        blocks: &mut UnboundedReceiver<AudioBlock>,
    ) -> Result<Transcript, RecognitionError> {
        let result = self.run_inner(blocks).await;

        let discarded = drain(blocks);
        if discarded > 0 {
            log::debug!("session: discarded {discarded} queued block(s)");
        }
        self.state = SessionState::Closed;
        self.indicator.off();

        match &result {
            Ok(t) => log::info!("session: '{}' ({})", t.text, t.status.label()),
            Err(e) => log::error!("session: abandoned: {e}"),
        }
        result
    }

    async fn run_inner(
        &mut self,
        blocks: &mut UnboundedReceiver<AudioBlock>,
    ) -> Result<Transcript, RecognitionError> {
        VoiceActivityDetector::check_sub_block(self.sub_block_ms)?;

        self.state = SessionState::Connecting;
        let mut conn = self.connector.connect().await?;
        conn.send_text(&wire::config_message(self.sample_rate)).await?;

        self.state = SessionState::Listening;
        self.indicator.listen();
        log::debug!("session: listening @ {} Hz", self.sample_rate);

        let status = loop {
            let Some(block) = blocks.recv().await else {
                log::warn!("session: audio source closed");
                break TranscriptStatus::InputClosed;
            };

            let is_voice = self
                .vad
                .is_voice(block.pcm(), block.sample_rate(), self.sub_block_ms)?;

            if is_voice {
                self.indicator.think();
                stream_block(conn.as_mut(), block.pcm()).await?;
                self.blocks_sent += 1;
                self.indicator.listen();
            }

            match self.policy.observe(is_voice, block.frames()) {
                PolicyDecision::Continue => {}
                PolicyDecision::SilenceTimeout => break TranscriptStatus::SilenceTimeout,
                PolicyDecision::VoiceLimit => break TranscriptStatus::VoiceLimit,
            }
        };

        self.state = SessionState::Closing;
        let discarded = drain(blocks);
        log::debug!(
            "session: stopping ({}) after {} voice block(s), {discarded} late block(s) dropped",
            status.label(),
            self.blocks_sent
        );

        let text = finish(conn.as_mut()).await?;
        if let Err(e) = conn.close().await {
            log::debug!("session: close: {e}");
        }
        Ok(Transcript { text, status })
    }
}

// ---------------------------------------------------------------------------
// Shared wire exchange (live + batch)
// ---------------------------------------------------------------------------

/// Send one PCM block and await its reply.
pub(crate) async fn stream_block(
    conn: &mut dyn RecognitionConnection,
    pcm: &[u8],
) -> Result<Reply, RecognitionError> {
    conn.send_audio(pcm).await?;
    let reply = wire::parse_reply_lenient(&conn.recv_text().await?);
    if let Some(partial) = reply.partial.as_deref().filter(|p| !p.is_empty()) {
        log::debug!("session: partial '{partial}'");
    }
    if let Some(text) = reply.text.as_deref().filter(|t| !t.is_empty()) {
        log::debug!("session: segment '{text}'");
    }
    Ok(reply)
}

/// Send end-of-stream and return the final text (empty if none).
pub(crate) async fn finish(conn: &mut dyn RecognitionConnection) -> Result<String, RecognitionError> {
    conn.send_text(wire::EOF_MESSAGE).await?;
    let reply = wire::parse_reply_lenient(&conn.recv_text().await?);
    Ok(reply.text.unwrap_or_default().trim().to_string())
}

fn drain(blocks: &mut UnboundedReceiver<AudioBlock>) -> usize {
    let mut n = 0;
    while blocks.try_recv().is_ok() {
        n += 1;
    }
    n
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
