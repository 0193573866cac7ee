//! Duplex connection to the recognition service.
//!
//! [`RecognitionConnector`] opens one [`RecognitionConnection`] per session.
//! [`WsConnector`] is the production implementation over
//! `tokio-tungstenite`; every awaited server message is bounded by the
//! configured reply timeout.
//!
//! [`MockConnector`] (available under `#[cfg(test)]`) is a scripted service
//! that records what it was sent.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::RecognitionError;
use crate::config::RecognitionConfig;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Opens connections to the recognition service.
#[async_trait]
pub trait RecognitionConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn RecognitionConnection>, RecognitionError>;
}

/// One open duplex connection.  Owned by a single session.
#[async_trait]
pub trait RecognitionConnection: Send {
    async fn send_text(&mut self, text: &str) -> Result<(), RecognitionError>;

    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), RecognitionError>;

    /// Next text message from the server.
    async fn recv_text(&mut self) -> Result<String, RecognitionError>;

    async fn close(&mut self) -> Result<(), RecognitionError>;
}

// ---------------------------------------------------------------------------
// WsConnector
// ---------------------------------------------------------------------------

/// Websocket connector for `ws://` / `wss://` URIs.
#[derive(Debug, Clone)]
pub struct WsConnector {
    uri: String,
    reply_timeout: Duration,
}

impl WsConnector {
    /// # Errors
    ///
    /// [`RecognitionError::MissingUri`] when `uri` is blank.
    pub fn new(uri: impl Into<String>, reply_timeout: Duration) -> Result<Self, RecognitionError> {
        let uri = uri.into().trim().to_string();
        if uri.is_empty() {
            return Err(RecognitionError::MissingUri);
        }
        Ok(Self { uri, reply_timeout })
    }

    pub fn from_config(config: &RecognitionConfig) -> Result<Self, RecognitionError> {
        Self::new(
            config.uri.clone(),
            Duration::from_secs(config.reply_timeout_secs),
        )
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

#[async_trait]
impl RecognitionConnector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn RecognitionConnection>, RecognitionError> {
        let (stream, _response) = timeout(self.reply_timeout, connect_async(self.uri.as_str()))
            .await
            .map_err(|_| RecognitionError::ReplyTimeout(self.reply_timeout))??;

        log::debug!("session: connected to {}", self.uri);
        Ok(Box::new(WsConnection {
            stream,
            reply_timeout: self.reply_timeout,
        }))
    }
}

struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    reply_timeout: Duration,
}

#[async_trait]
impl RecognitionConnection for WsConnection {
    async fn send_text(&mut self, text: &str) -> Result<(), RecognitionError> {
        self.stream.send(Message::Text(text.to_string().into())).await?;
        Ok(())
    }

    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), RecognitionError> {
        self.stream.send(Message::Binary(pcm.to_vec().into())).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String, RecognitionError> {
        loop {
            let next = timeout(self.reply_timeout, self.stream.next())
                .await
                .map_err(|_| RecognitionError::ReplyTimeout(self.reply_timeout))?;

            match next {
                Some(Ok(Message::Text(text))) => return Ok(text.to_string()),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(String::from_utf8_lossy(&data).into_owned())
                }
                Some(Ok(Message::Close(frame))) => {
                    return Err(RecognitionError::Connection(format!(
                        "server closed the connection ({frame:?})"
                    )))
                }
                // Control frames; tungstenite answers pings itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    return Err(RecognitionError::Connection(
                        "connection closed by server".into(),
                    ))
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), RecognitionError> {
        self.stream.close(None).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockConnector  (test-only)
// ---------------------------------------------------------------------------

/// Frame recorded by [`MockConnector`].
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub enum SentFrame {
    Text(String),
    Audio(Vec<u8>),
}

/// Scripted recognition service.
///
/// Answers every audio frame with `audio_reply`, answers `{"eof":1}` with
/// `{"text": final_text}`, and records every frame sent on any connection.
#[cfg(test)]
#[derive(Clone)]
pub struct MockConnector {
    final_text: String,
    audio_reply: String,
    refuse: bool,
    fail_audio_at: Option<usize>,
    sent: std::sync::Arc<std::sync::Mutex<Vec<SentFrame>>>,
    connections: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MockConnector {
    pub fn new(final_text: impl Into<String>) -> Self {
        Self {
            final_text: final_text.into(),
            audio_reply: r#"{"partial": ""}"#.into(),
            refuse: false,
            fail_audio_at: None,
            sent: Default::default(),
            connections: Default::default(),
        }
    }

    /// Every connection attempt fails.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new("")
        }
    }

    /// Raw reply sent for each audio frame.
    pub fn with_audio_reply(mut self, raw: impl Into<String>) -> Self {
        self.audio_reply = raw.into();
        self
    }

    /// The `n`-th audio frame (0-based, per connection) fails to send.
    pub fn failing_audio_at(mut self, n: usize) -> Self {
        self.fail_audio_at = Some(n);
        self
    }

    pub fn sent(&self) -> Vec<SentFrame> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn audio_frames(&self) -> usize {
        self.sent()
            .iter()
            .filter(|f| matches!(f, SentFrame::Audio(_)))
            .count()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|f| match f {
                SentFrame::Text(t) => Some(t),
                SentFrame::Audio(_) => None,
            })
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn record(&self, frame: SentFrame) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(frame);
        }
    }
}

#[cfg(test)]
#[async_trait]
impl RecognitionConnector for MockConnector {
    async fn connect(&self) -> Result<Box<dyn RecognitionConnection>, RecognitionError> {
        if self.refuse {
            return Err(RecognitionError::Connection("connection refused".into()));
        }
        self.connections
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            service: self.clone(),
            pending: None,
            audio_sent: 0,
        }))
    }
}

#[cfg(test)]
enum PendingReply {
    Audio,
    Final,
}

#[cfg(test)]
struct MockConnection {
    service: MockConnector,
    pending: Option<PendingReply>,
    audio_sent: usize,
}

#[cfg(test)]
#[async_trait]
impl RecognitionConnection for MockConnection {
    async fn send_text(&mut self, text: &str) -> Result<(), RecognitionError> {
        self.service.record(SentFrame::Text(text.to_string()));
        if text == super::wire::EOF_MESSAGE {
            self.pending = Some(PendingReply::Final);
        }
        Ok(())
    }

    async fn send_audio(&mut self, pcm: &[u8]) -> Result<(), RecognitionError> {
        if self.service.fail_audio_at == Some(self.audio_sent) {
            return Err(RecognitionError::Connection("connection reset".into()));
        }
        self.audio_sent += 1;
        self.service.record(SentFrame::Audio(pcm.to_vec()));
        self.pending = Some(PendingReply::Audio);
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String, RecognitionError> {
        match self.pending.take() {
            Some(PendingReply::Audio) => Ok(self.service.audio_reply.clone()),
            Some(PendingReply::Final) => {
                Ok(serde_json::json!({ "text": self.service.final_text }).to_string())
            }
            None => Err(RecognitionError::ReplyTimeout(Duration::from_millis(1))),
        }
    }

    async fn close(&mut self) -> Result<(), RecognitionError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
