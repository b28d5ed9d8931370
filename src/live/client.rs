//! Websocket client for the live streaming API.

use crate::audio::codec::WireAudioBlob;
use crate::defaults;
use crate::error::{Result, VoxlinkError};
use crate::live::protocol::{ClientMessage, ServerMessage};
use crate::live::session::{LiveConnector, LiveSession, ServiceEvent, SessionSetup};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// How long to wait for the service's setup acknowledgment.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connector for the bidirectional streaming endpoint.
///
/// The API credential is read from the process environment once, at
/// construction. Each `connect` opens a fresh websocket, sends the setup
/// frame, and resolves after the service acknowledges it.
pub struct GeminiLiveConnector {
    api_key: String,
    endpoint: String,
}

impl GeminiLiveConnector {
    /// Build a connector with an explicit credential.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: defaults::LIVE_ENDPOINT.to_string(),
        }
    }

    /// Build a connector from the process environment.
    ///
    /// # Errors
    /// Returns `VoxlinkError::MissingCredential` when the variable is unset
    /// or empty.
    pub fn from_env() -> Result<Self> {
        match std::env::var(defaults::API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(Self::new(key)),
            _ => Err(VoxlinkError::MissingCredential {
                var: defaults::API_KEY_ENV.to_string(),
            }),
        }
    }

    /// Override the websocket endpoint (testing against a local server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn url(&self) -> String {
        format!("{}?key={}", self.endpoint, self.api_key)
    }
}

/// Parse one websocket message into a server frame, if it carries one.
fn parse_frame(message: &Message) -> Option<ServerMessage> {
    let parsed = match message {
        Message::Text(text) => serde_json::from_str::<ServerMessage>(text),
        Message::Binary(bytes) => serde_json::from_slice::<ServerMessage>(bytes),
        _ => return None,
    };

    match parsed {
        Ok(frame) => Some(frame),
        Err(e) => {
            warn!("unparseable server frame: {}", e);
            None
        }
    }
}

/// Pump server frames into the event channel until the stream ends.
///
/// Exactly one terminal event (`Closed` or `Error`) is emitted, after which
/// the task exits.
async fn read_loop(mut read: WsSource, events: mpsc::Sender<ServiceEvent>) {
    let terminal = loop {
        match read.next().await {
            Some(Ok(Message::Close(frame))) => {
                break ServiceEvent::Closed {
                    reason: frame.map(|f| f.reason.to_string()),
                };
            }
            Some(Ok(message)) => {
                let Some(frame) = parse_frame(&message) else {
                    continue;
                };
                for event in frame.into_events() {
                    if events.send(event).await.is_err() {
                        // Receiver gone: the session is being torn down.
                        return;
                    }
                }
            }
            Some(Err(e)) => break ServiceEvent::Error(e.to_string()),
            None => break ServiceEvent::Closed { reason: None },
        }
    };

    let _ = events.send(terminal).await;
}

#[async_trait]
impl LiveConnector for GeminiLiveConnector {
    async fn connect(
        &self,
        setup: &SessionSetup,
        events: mpsc::Sender<ServiceEvent>,
    ) -> Result<Box<dyn LiveSession>> {
        let (stream, _response) =
            connect_async(self.url())
                .await
                .map_err(|e| VoxlinkError::SessionOpen {
                    message: format!("websocket connect failed: {}", e),
                })?;
        let (mut write, mut read) = stream.split();

        let setup_frame =
            serde_json::to_string(&ClientMessage::setup(setup)).map_err(|e| {
                VoxlinkError::SessionOpen {
                    message: format!("failed to encode setup frame: {}", e),
                }
            })?;
        write
            .send(Message::Text(setup_frame))
            .await
            .map_err(|e| VoxlinkError::SessionOpen {
                message: format!("failed to send setup frame: {}", e),
            })?;

        // The session is not usable until the service acknowledges setup.
        loop {
            let item = tokio::time::timeout(HANDSHAKE_TIMEOUT, read.next())
                .await
                .map_err(|_| VoxlinkError::SessionOpen {
                    message: format!(
                        "no setup acknowledgment within {}s",
                        HANDSHAKE_TIMEOUT.as_secs()
                    ),
                })?;

            match item {
                Some(Ok(message)) => {
                    if let Some(frame) = parse_frame(&message) {
                        if frame.is_setup_complete() {
                            break;
                        }
                        debug!("ignoring pre-ack server frame");
                    }
                    if matches!(message, Message::Close(_)) {
                        return Err(VoxlinkError::SessionOpen {
                            message: "session closed before setup acknowledgment".to_string(),
                        });
                    }
                }
                Some(Err(e)) => {
                    return Err(VoxlinkError::SessionOpen {
                        message: format!("transport error during handshake: {}", e),
                    });
                }
                None => {
                    return Err(VoxlinkError::SessionOpen {
                        message: "stream ended before setup acknowledgment".to_string(),
                    });
                }
            }
        }

        debug!("live session established");
        let reader = tokio::spawn(read_loop(read, events));

        Ok(Box::new(GeminiLiveSession {
            write,
            reader,
            closed: false,
        }))
    }
}

/// Send half of one open live session.
pub struct GeminiLiveSession {
    write: WsSink,
    reader: JoinHandle<()>,
    closed: bool,
}

#[async_trait]
impl LiveSession for GeminiLiveSession {
    async fn send_media(&mut self, blob: WireAudioBlob) -> Result<()> {
        let frame = serde_json::to_string(&ClientMessage::realtime(blob)).map_err(|e| {
            VoxlinkError::Transport {
                message: format!("failed to encode media frame: {}", e),
            }
        })?;

        self.write
            .send(Message::Text(frame))
            .await
            .map_err(|e| VoxlinkError::Transport {
                message: format!("failed to send media frame: {}", e),
            })
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Best-effort close handshake; the peer may already be gone.
        let _ = self.write.send(Message::Close(None)).await;
        let _ = self.write.close().await;
        self.reader.abort();
        Ok(())
    }
}

impl Drop for GeminiLiveSession {
    fn drop(&mut self) {
        self.reader.abort();
    }
}
