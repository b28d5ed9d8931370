//! Live session controller.
//!
//! Owns the whole pipeline for one session: capture polling, frame
//! encoding and transmission, service event dispatch, playback scheduling,
//! and the transcript. All session state is constructed on `start` and torn
//! down on `stop`; nothing ambient survives between sessions.
//!
//! ```text
//!  capture task ──Frame──────┐
//!                            ├──▶ event loop ──▶ live.send_media
//!  service forwarder ─Service┘        │
//!       ▲                             ├──▶ scheduler (audio, flush)
//!  ws reader                          └──▶ transcript (fragments)
//! ```
//!
//! Both producers feed one channel; the loop task is the only mutator of
//! the scheduler and transcript, so no locking is needed around the
//! playback timeline.

use crate::audio::codec::{CaptureFrame, FrameAssembler, decode_payload, encode_blob};
use crate::audio::playback::{AudioOut, PlaybackScheduler};
use crate::audio::source::CaptureSource;
use crate::config::Config;
use crate::defaults;
use crate::error::{Result, VoxlinkError};
use crate::live::session::{LiveConnector, LiveSession, ServiceEvent, SessionSetup};
use crate::session::transcript::{Speaker, Transcript};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Consecutive capture read failures tolerated before the session ends.
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// Out-of-band notification to the embedding UI.
///
/// Delivered best-effort over a crossbeam channel; the session never blocks
/// on a slow consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// The session reached the active state.
    Connected,
    /// A transcript line was appended (already rendered with its speaker).
    Line(String),
    /// The remote side signalled a barge-in; playback was flushed.
    Interrupted,
    /// The assistant finished a response turn.
    TurnComplete,
    /// A finite capture source ran out of input.
    CaptureEnded,
    /// The session ended from the remote side.
    Closed { reason: Option<String> },
    /// The session ended on an error.
    Error(String),
}

/// Everything that flows into the single consumption point.
enum SessionEvent {
    Frame(CaptureFrame),
    Service(ServiceEvent),
    CaptureEnded,
    CaptureFailed(String),
}

/// Observable flags and transcript, shared with the loop task.
#[derive(Debug, Default)]
struct SharedStatus {
    connecting: AtomicBool,
    active: AtomicBool,
    transcript: Mutex<Transcript>,
}

/// State owned only while a session runs.
struct RunningSession {
    shutdown: watch::Sender<bool>,
    loop_task: JoinHandle<()>,
    capture_task: JoinHandle<()>,
}

/// Live session controller: at most one remote session at a time.
///
/// States: idle → connecting → active → idle. Failure during connect
/// unwinds to idle with no retry; remote close and transport errors reach
/// the same teardown as an explicit [`stop`](Session::stop).
pub struct Session {
    setup: SessionSetup,
    input_sample_rate: u32,
    output_sample_rate: u32,
    capture_window: usize,
    status: Arc<SharedStatus>,
    notices: Option<crossbeam_channel::Sender<SessionNotice>>,
    running: Option<RunningSession>,
}

impl Session {
    /// Create an idle controller from the loaded configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            setup: SessionSetup::from_config(config),
            input_sample_rate: config.audio.input_sample_rate,
            output_sample_rate: config.audio.output_sample_rate,
            capture_window: config.audio.capture_window,
            status: Arc::new(SharedStatus::default()),
            notices: None,
            running: None,
        }
    }

    /// Attach an out-of-band notice feed (non-blocking sends).
    pub fn with_notices(mut self, notices: crossbeam_channel::Sender<SessionNotice>) -> Self {
        self.notices = Some(notices);
        self
    }

    /// Whether a session is currently active.
    pub fn is_active(&self) -> bool {
        self.status.active.load(Ordering::SeqCst)
    }

    /// Whether a session is being established.
    pub fn is_connecting(&self) -> bool {
        self.status.connecting.load(Ordering::SeqCst)
    }

    /// Snapshot of the rendered transcript scrollback.
    pub fn transcript_lines(&self) -> Vec<String> {
        self.status
            .transcript
            .lock()
            .map(|t| t.lines())
            .unwrap_or_default()
    }

    /// Open a session: start capture, connect, and spawn the pipeline.
    ///
    /// Resolves once the service has acknowledged the session setup. On any
    /// failure everything already acquired is released and the controller
    /// returns to idle; the caller decides whether to try again.
    pub async fn start(
        &mut self,
        mut capture: Box<dyn CaptureSource>,
        connector: &dyn LiveConnector,
        out: Box<dyn AudioOut>,
    ) -> Result<()> {
        if let Some(running) = &self.running {
            if !running.loop_task.is_finished() {
                return Err(VoxlinkError::SessionOpen {
                    message: "a session is already open".to_string(),
                });
            }
        }
        // Any previous session either stopped or ended remotely; reap it.
        self.running = None;

        self.status.connecting.store(true, Ordering::SeqCst);

        if let Err(e) = capture.start() {
            self.status.connecting.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let (event_tx, event_rx) = mpsc::channel(defaults::EVENT_BUFFER);
        let (service_tx, mut service_rx) = mpsc::channel(defaults::EVENT_BUFFER);

        let live = match connector.connect(&self.setup, service_tx).await {
            Ok(live) => live,
            Err(e) => {
                if let Err(stop_err) = capture.stop() {
                    debug!("capture stop after failed connect: {}", stop_err);
                }
                self.status.connecting.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let capture_task = tokio::spawn(capture_loop(
            capture,
            self.capture_window,
            event_tx.clone(),
            shutdown_rx.clone(),
        ));

        // Bridge service events into the shared channel. Unlike capture
        // frames, service events are never dropped under pressure.
        let service_event_tx = event_tx;
        tokio::spawn(async move {
            while let Some(event) = service_rx.recv().await {
                if service_event_tx
                    .send(SessionEvent::Service(event))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        });

        let loop_task = tokio::spawn(session_loop(
            live,
            PlaybackScheduler::new(out),
            self.input_sample_rate,
            self.output_sample_rate,
            event_rx,
            shutdown_rx,
            self.status.clone(),
            self.notices.clone(),
        ));

        self.status.connecting.store(false, Ordering::SeqCst);
        self.status.active.store(true, Ordering::SeqCst);
        self.notify(SessionNotice::Connected);
        info!(model = %self.setup.model, "live session active");

        self.running = Some(RunningSession {
            shutdown: shutdown_tx,
            loop_task,
            capture_task,
        });
        Ok(())
    }

    /// Tear the session down.
    ///
    /// Idempotent: safe when idle, safe called repeatedly, and safe after a
    /// remote close already ran the teardown. Never fails.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.shutdown.send_replace(true);
        if let Err(e) = running.loop_task.await {
            debug!("session loop join: {}", e);
        }
        if let Err(e) = running.capture_task.await {
            debug!("capture task join: {}", e);
        }
    }

    fn notify(&self, notice: SessionNotice) {
        if let Some(notices) = &self.notices {
            let _ = notices.try_send(notice);
        }
    }
}

/// Poll the capture source, reframe its deliveries, and feed the event
/// channel. Frames are fire-and-forget: when the channel is full they are
/// dropped, never awaited.
async fn capture_loop(
    mut source: Box<dyn CaptureSource>,
    window: usize,
    events: mpsc::Sender<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut assembler = FrameAssembler::new(window);
    let mut interval = tokio::time::interval(Duration::from_millis(defaults::CAPTURE_POLL_MS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut consecutive_errors: u32 = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                if events.is_closed() {
                    // The session loop is gone (remote close or error);
                    // release the device without waiting for an explicit stop.
                    break;
                }

                let samples = match source.read_samples() {
                    Ok(samples) => {
                        consecutive_errors = 0;
                        samples
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            warn!("capture failed {} times in a row: {}", consecutive_errors, e);
                            let _ = events.try_send(SessionEvent::CaptureFailed(e.to_string()));
                            break;
                        }
                        continue;
                    }
                };

                if samples.is_empty() {
                    if source.is_finite() {
                        let _ = events.try_send(SessionEvent::CaptureEnded);
                        break;
                    }
                    // Live source: empty reads are normal while the device
                    // spins up.
                    continue;
                }

                for frame in assembler.push(&samples) {
                    if events.try_send(SessionEvent::Frame(frame)).is_err() {
                        debug!("event channel full, capture frame dropped");
                    }
                }
            }
        }
    }

    if let Err(e) = source.stop() {
        debug!("capture stop: {}", e);
    }
}

/// The single consumption point: dispatches every event of the session and
/// runs the one teardown path when the session ends, whichever side ended
/// it.
#[allow(clippy::too_many_arguments)]
async fn session_loop(
    mut live: Box<dyn LiveSession>,
    mut scheduler: PlaybackScheduler,
    input_rate: u32,
    output_rate: u32,
    mut events: mpsc::Receiver<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
    status: Arc<SharedStatus>,
    notices: Option<crossbeam_channel::Sender<SessionNotice>>,
) {
    let notify = |notice: SessionNotice| {
        if let Some(notices) = &notices {
            let _ = notices.try_send(notice);
        }
    };

    let push_line = |speaker: Speaker, text: String| {
        if let Ok(mut transcript) = status.transcript.lock() {
            transcript.push(speaker, text);
            if let Some(line) = transcript.lines().last() {
                notify(SessionNotice::Line(line.clone()));
            }
        }
    };

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                None => break,
                Some(SessionEvent::Frame(frame)) => {
                    let blob = encode_blob(&frame.samples, input_rate);
                    if let Err(e) = live.send_media(blob).await {
                        // Per-frame sends are best-effort; the session ends
                        // through a Closed/Error event, not a send failure.
                        warn!(sequence = frame.sequence, "media send failed: {}", e);
                    }
                }
                Some(SessionEvent::Service(service_event)) => match service_event {
                    ServiceEvent::Audio(bytes) => {
                        match decode_payload(&bytes, output_rate, 1) {
                            Ok(chunk) => {
                                if let Err(e) = scheduler.schedule(chunk) {
                                    warn!("playback scheduling failed: {}", e);
                                }
                            }
                            Err(e) => warn!("audio payload dropped: {}", e),
                        }
                    }
                    ServiceEvent::InputTranscript(text) => push_line(Speaker::User, text),
                    ServiceEvent::OutputTranscript(text) => push_line(Speaker::Assistant, text),
                    ServiceEvent::Interrupted => {
                        debug!("barge-in: flushing scheduled playback");
                        scheduler.flush();
                        notify(SessionNotice::Interrupted);
                    }
                    ServiceEvent::TurnComplete => {
                        debug!("response turn complete");
                        notify(SessionNotice::TurnComplete);
                    }
                    ServiceEvent::Closed { reason } => {
                        info!(?reason, "session closed by remote");
                        notify(SessionNotice::Closed { reason });
                        break;
                    }
                    ServiceEvent::Error(message) => {
                        warn!("session error: {}", message);
                        notify(SessionNotice::Error(message));
                        break;
                    }
                },
                Some(SessionEvent::CaptureEnded) => {
                    info!("capture source ended");
                    notify(SessionNotice::CaptureEnded);
                }
                Some(SessionEvent::CaptureFailed(message)) => {
                    warn!("capture failed: {}", message);
                    notify(SessionNotice::Error(message));
                    break;
                }
            }
        }
    }

    // Single teardown path. Every step is best-effort; the session must
    // always land back in a clean idle state.
    if let Err(e) = live.close().await {
        debug!("session close: {}", e);
    }
    scheduler.flush();
    if let Ok(mut transcript) = status.transcript.lock() {
        transcript.clear();
    }
    status.active.store(false, Ordering::SeqCst);
    status.connecting.store(false, Ordering::SeqCst);
}
