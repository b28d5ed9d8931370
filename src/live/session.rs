//! Live session traits and test doubles.

use crate::audio::codec::WireAudioBlob;
use crate::config::Config;
use crate::error::{Result, VoxlinkError};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Parameters for opening a live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSetup {
    /// Model identifier.
    pub model: String,
    /// Prebuilt voice name for audio responses.
    pub voice: String,
    /// System instruction text.
    pub system_instruction: String,
}

impl SessionSetup {
    /// Build session parameters from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.session.model.clone(),
            voice: config.session.voice.clone(),
            system_instruction: config.session.system_instruction.clone(),
        }
    }
}

/// Provider-agnostic event produced by a live session.
///
/// The reader side of every connector implementation translates its wire
/// frames into these and pushes them onto the channel handed to `connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceEvent {
    /// Response audio payload (16-bit PCM bytes, 24kHz mono).
    Audio(Vec<u8>),
    /// Transcription fragment of the user's speech.
    InputTranscript(String),
    /// Transcription fragment of the assistant's speech.
    OutputTranscript(String),
    /// The user started speaking over an in-progress response; scheduled
    /// playback must be flushed immediately.
    Interrupted,
    /// The assistant finished a response turn.
    TurnComplete,
    /// The remote side closed the session.
    Closed { reason: Option<String> },
    /// Transport or protocol error; the session is over.
    Error(String),
}

/// Opens live sessions against a remote service.
///
/// This trait allows swapping implementations (real websocket client vs
/// mock). `connect` resolves only after the service has acknowledged the
/// session setup; events stream onto `events` from then on.
#[async_trait]
pub trait LiveConnector: Send + Sync {
    async fn connect(
        &self,
        setup: &SessionSetup,
        events: mpsc::Sender<ServiceEvent>,
    ) -> Result<Box<dyn LiveSession>>;
}

/// Handle to one open live session: the send half plus close.
#[async_trait]
pub trait LiveSession: Send {
    /// Send one realtime media frame. Fire-and-forget from the caller's
    /// perspective; failures are reported but frames are never retried.
    async fn send_media(&mut self, blob: WireAudioBlob) -> Result<()>;

    /// Close the session. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;
}

/// State shared between the mock connector, its sessions, and tests.
#[derive(Debug, Default)]
struct MockLiveState {
    sent: Vec<WireAudioBlob>,
    closed: bool,
    connects: usize,
    events_tx: Option<mpsc::Sender<ServiceEvent>>,
    setup: Option<SessionSetup>,
}

/// Mock connector for testing.
///
/// Sessions record every sent blob; tests drive incoming events through the
/// [`MockLiveHandle`] after the connector has been handed to a controller.
#[derive(Debug, Default)]
pub struct MockLiveConnector {
    state: Arc<Mutex<MockLiveState>>,
    initial_events: Vec<ServiceEvent>,
    should_fail_connect: bool,
    error_message: String,
}

/// Observation and control handle for a `MockLiveConnector`.
#[derive(Debug, Clone)]
pub struct MockLiveHandle {
    state: Arc<Mutex<MockLiveState>>,
}

/// Mock session returned by `MockLiveConnector::connect`.
pub struct MockLiveSession {
    state: Arc<Mutex<MockLiveState>>,
}

impl MockLiveConnector {
    /// Create a connector whose sessions open successfully and emit nothing.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockLiveState::default())),
            initial_events: Vec::new(),
            should_fail_connect: false,
            error_message: "mock connect error".to_string(),
        }
    }

    /// Queue events emitted immediately after a successful connect.
    pub fn with_events(mut self, events: Vec<ServiceEvent>) -> Self {
        self.initial_events = events;
        self
    }

    /// Configure the connector to reject `connect`.
    pub fn with_connect_failure(mut self) -> Self {
        self.should_fail_connect = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Handle for observing sends and injecting events.
    pub fn handle(&self) -> MockLiveHandle {
        MockLiveHandle {
            state: self.state.clone(),
        }
    }
}

#[allow(clippy::unwrap_used)] // test double; a poisoned lock is a failed test
impl MockLiveHandle {
    /// Inject a service event into the open session.
    pub async fn emit(&self, event: ServiceEvent) {
        let tx = self.state.lock().unwrap().events_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    /// Every media blob sent so far.
    pub fn sent(&self) -> Vec<WireAudioBlob> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Number of media blobs sent so far.
    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    /// Whether the session was closed.
    pub fn closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Number of `connect` calls made against the connector.
    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// The setup the session was opened with.
    pub fn setup(&self) -> Option<SessionSetup> {
        self.state.lock().unwrap().setup.clone()
    }
}

#[async_trait]
impl LiveConnector for MockLiveConnector {
    async fn connect(
        &self,
        setup: &SessionSetup,
        events: mpsc::Sender<ServiceEvent>,
    ) -> Result<Box<dyn LiveSession>> {
        {
            let mut state = self.state.lock().map_err(|e| VoxlinkError::SessionOpen {
                message: format!("mock state poisoned: {}", e),
            })?;
            state.connects += 1;
            state.setup = Some(setup.clone());

            if self.should_fail_connect {
                return Err(VoxlinkError::SessionOpen {
                    message: self.error_message.clone(),
                });
            }
            state.events_tx = Some(events.clone());
        }

        for event in self.initial_events.clone() {
            let _ = events.send(event).await;
        }

        Ok(Box::new(MockLiveSession {
            state: self.state.clone(),
        }))
    }
}

#[async_trait]
impl LiveSession for MockLiveSession {
    async fn send_media(&mut self, blob: WireAudioBlob) -> Result<()> {
        let mut state = self.state.lock().map_err(|e| VoxlinkError::Transport {
            message: format!("mock state poisoned: {}", e),
        })?;
        state.sent.push(blob);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let mut state = self.state.lock().map_err(|e| VoxlinkError::Transport {
            message: format!("mock state poisoned: {}", e),
        })?;
        state.closed = true;
        state.events_tx = None;
        Ok(())
    }
}
