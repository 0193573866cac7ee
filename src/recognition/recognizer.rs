//! The listen-once seam the orchestrator drives.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::session::StreamingRecognitionSession;
use super::transport::RecognitionConnector;
use super::{RecognitionError, Transcript};
use crate::audio::{AudioCapture, VoiceActivityDetector};
use crate::context::AppContext;

/// Runs one recognition session and returns its transcript.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn listen(&self) -> Result<Transcript, RecognitionError>;
}

/// Live microphone recognition.
///
/// Every [`listen`](Recognizer::listen) opens the microphone on a fresh
/// block channel, runs one [`StreamingRecognitionSession`] and releases the
/// device when the session returns, on every path.
pub struct LiveRecognizer {
    ctx: AppContext,
    connector: Arc<dyn RecognitionConnector>,
}

impl LiveRecognizer {
    pub fn new(ctx: AppContext, connector: Arc<dyn RecognitionConnector>) -> Self {
        Self { ctx, connector }
    }
}

#[async_trait]
impl Recognizer for LiveRecognizer {
    async fn listen(&self) -> Result<Transcript, RecognitionError> {
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Opening the device waits for the capture thread to report back.
        let ctx = self.ctx.clone();
        let guard = tokio::task::spawn_blocking(move || AudioCapture::open(&ctx, tx)).await??;

        let vad = VoiceActivityDetector::from_config(&self.ctx.config.vad);
        let mut session =
            StreamingRecognitionSession::new(&self.ctx, Arc::clone(&self.connector), vad);
        let result = session.run(&mut rx).await;

        drop(guard);
        result
    }
}
