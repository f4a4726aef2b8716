//! Text-frame transports the session actor runs over.
//!
//! A [`Connector`] opens one bidirectional connection and hands back its two
//! halves. The actor writes through the sink and reads from the stream
//! concurrently, so the halves are separate values.

use std::future::Future;
use std::sync::Mutex;

use futures_util::{SinkExt, StreamExt};
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};

pub trait FrameSink: Send + 'static {
    fn send_frame(&mut self, frame: String) -> impl Future<Output = Result<()>> + Send;
}

pub trait FrameStream: Send + 'static {
    /// Next text frame, or `None` once the peer has closed the connection.
    fn next_frame(&mut self) -> impl Future<Output = Option<Result<String>>> + Send;
}

pub trait Connector: Send + Sync + 'static {
    type Sink: FrameSink;
    type Stream: FrameStream;

    fn connect(
        &self,
        config: &SessionConfig,
    ) -> impl Future<Output = Result<(Self::Sink, Self::Stream)>> + Send;
}

// --- WebSocket ---

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects with `tokio-tungstenite`, advertising the configured sub-protocol.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

pub struct WebSocketSink(SplitSink<Socket, Message>);

pub struct WebSocketFrames(SplitStream<Socket>);

impl Connector for WebSocketConnector {
    type Sink = WebSocketSink;
    type Stream = WebSocketFrames;

    async fn connect(&self, config: &SessionConfig) -> Result<(WebSocketSink, WebSocketFrames)> {
        let mut request = config.endpoint.as_str().into_client_request()?;
        let protocol = HeaderValue::from_str(&config.subprotocol)
            .map_err(|e| SessionError::Config(format!("bad sub-protocol: {e}")))?;
        request
            .headers_mut()
            .insert("Sec-WebSocket-Protocol", protocol);

        let (socket, response) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!(
            endpoint = %config.endpoint,
            status = %response.status(),
            "graph socket connected"
        );
        let (sink, stream) = socket.split();
        Ok((WebSocketSink(sink), WebSocketFrames(stream)))
    }
}

impl FrameSink for WebSocketSink {
    async fn send_frame(&mut self, frame: String) -> Result<()> {
        self.0.send(Message::Text(frame)).await?;
        Ok(())
    }
}

impl FrameStream for WebSocketFrames {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        loop {
            match self.0.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                Ok(other) => {
                    tracing::trace!(len = other.len(), "skipping non-text frame");
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

// --- In-memory ---

/// Frames the session wrote, as seen by the other end of a [`MemoryConnector`].
pub type Outbox = mpsc::UnboundedReceiver<String>;

/// Frames to deliver to the session through a [`MemoryConnector`].
pub type Inbox = mpsc::UnboundedSender<String>;

/// Connector over in-process channels. Each call to [`MemoryConnector::pair`]
/// prepares one connection; `connect` fails with `Unavailable` when none is
/// left, which is how a refused connection looks to the session.
#[derive(Default)]
pub struct MemoryConnector {
    ready: Mutex<Vec<(MemorySink, MemoryStream)>>,
}

pub struct MemorySink(mpsc::UnboundedSender<String>);

pub struct MemoryStream(mpsc::UnboundedReceiver<String>);

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one connection and return the peer's ends of it.
    pub fn pair(&self) -> (Outbox, Inbox) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        if let Ok(mut ready) = self.ready.lock() {
            ready.push((MemorySink(out_tx), MemoryStream(in_rx)));
        }
        (out_rx, in_tx)
    }
}

impl Connector for MemoryConnector {
    type Sink = MemorySink;
    type Stream = MemoryStream;

    async fn connect(&self, _config: &SessionConfig) -> Result<(MemorySink, MemoryStream)> {
        let next = match self.ready.lock() {
            Ok(mut ready) if !ready.is_empty() => Some(ready.remove(0)),
            _ => None,
        };
        next.ok_or(SessionError::Unavailable)
    }
}

impl FrameSink for MemorySink {
    async fn send_frame(&mut self, frame: String) -> Result<()> {
        self.0
            .send(frame)
            .map_err(|_| SessionError::Transport("peer dropped".to_string()))
    }
}

impl FrameStream for MemoryStream {
    async fn next_frame(&mut self) -> Option<Result<String>> {
        self.0.recv().await.map(Ok)
    }
}
