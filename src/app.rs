//! Voice session application entry point.
//!
//! Wires real devices and the live connector into a session controller and
//! runs it until Ctrl-C, a `--for` deadline, the remote side closing, or —
//! in pipe mode — the piped audio finishing its final response turn.

use crate::audio::capture::{CpalCaptureSource, suppress_audio_warnings};
use crate::audio::output::CpalAudioOut;
use crate::audio::source::CaptureSource;
use crate::audio::wav::WavCaptureSource;
use crate::config::Config;
use crate::error::Result;
use crate::live::GeminiLiveConnector;
use crate::session::controller::{Session, SessionNotice};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::time::Duration;

/// Why the run ended; decides the exit message.
#[derive(Debug, PartialEq, Eq)]
enum EndReason {
    Interrupted,
    DeadlineReached,
    RemoteClosed,
    PipeFinished,
    SessionError(String),
}

/// Run a live voice session with real audio devices.
///
/// # Arguments
/// * `config` - Base configuration (can be overridden by CLI args)
/// * `device` - Optional input device override from CLI
/// * `output_device` - Optional output device override from CLI
/// * `model` / `voice` / `system` - Session overrides from CLI
/// * `quiet` - Suppress status messages
/// * `duration` - Optional wall-clock session limit
#[allow(clippy::too_many_arguments)]
pub async fn run_session_command(
    mut config: Config,
    device: Option<String>,
    output_device: Option<String>,
    model: Option<String>,
    voice: Option<String>,
    system: Option<String>,
    quiet: bool,
    duration: Option<Duration>,
) -> Result<()> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();

    // Apply CLI overrides
    if let Some(d) = device {
        config.audio.device = Some(d);
    }
    if let Some(m) = model {
        config.session.model = m;
    }
    if let Some(v) = voice {
        config.session.voice = v;
    }
    if let Some(s) = system {
        config.session.system_instruction = s;
    }
    config.validate()?;

    // Credential is read once, before any audio resources are touched.
    let connector = GeminiLiveConnector::from_env()?;

    let pipe_mode = !std::io::stdin().is_terminal();
    let capture: Box<dyn CaptureSource> = if pipe_mode {
        Box::new(WavCaptureSource::from_stdin()?)
    } else {
        Box::new(CpalCaptureSource::new(config.audio.device.as_deref())?)
    };

    let out = CpalAudioOut::new(
        output_device.as_deref(),
        config.audio.output_sample_rate,
    )?;

    let (notice_tx, notice_rx) = crossbeam_channel::unbounded();
    let mut session = Session::new(&config).with_notices(notice_tx);

    session.start(capture, &connector, Box::new(out)).await?;

    if !quiet {
        if pipe_mode {
            eprintln!("voxlink: streaming piped audio");
        } else {
            eprintln!("voxlink: session active — press Ctrl-C to stop");
        }
    }

    // Render notices off the async runtime; the channel never blocks the
    // session. The thread reports the session-ending notice back.
    let (end_tx, end_rx) = tokio::sync::oneshot::channel();
    let printer = std::thread::spawn(move || {
        let mut end_tx = Some(end_tx);
        let mut capture_ended = false;

        while let Ok(notice) = notice_rx.recv() {
            match notice {
                SessionNotice::Connected => {}
                SessionNotice::Line(line) => {
                    if line.starts_with("User:") {
                        println!("{}", line.dimmed());
                    } else {
                        println!("{}", line.green());
                    }
                }
                SessionNotice::Interrupted => {
                    if !quiet {
                        eprintln!("{}", "voxlink: interrupted".yellow());
                    }
                }
                SessionNotice::TurnComplete => {
                    if capture_ended && let Some(tx) = end_tx.take() {
                        let _ = tx.send(EndReason::PipeFinished);
                    }
                }
                SessionNotice::CaptureEnded => {
                    capture_ended = true;
                }
                SessionNotice::Closed { .. } => {
                    if let Some(tx) = end_tx.take() {
                        let _ = tx.send(EndReason::RemoteClosed);
                    }
                }
                SessionNotice::Error(message) => {
                    if let Some(tx) = end_tx.take() {
                        let _ = tx.send(EndReason::SessionError(message));
                    }
                }
            }
        }
    });

    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };

    let reason = tokio::select! {
        _ = tokio::signal::ctrl_c() => EndReason::Interrupted,
        _ = deadline => EndReason::DeadlineReached,
        end = end_rx => end.unwrap_or(EndReason::RemoteClosed),
    };

    session.stop().await;
    // Dropping the session releases the last notice sender; the printer
    // drains and exits.
    drop(session);
    let _ = printer.join();

    if !quiet {
        match reason {
            EndReason::Interrupted => eprintln!("voxlink: stopped"),
            EndReason::DeadlineReached => eprintln!("voxlink: session time limit reached"),
            EndReason::RemoteClosed => eprintln!("voxlink: session closed by service"),
            EndReason::PipeFinished => eprintln!("voxlink: piped audio complete"),
            EndReason::SessionError(message) => {
                eprintln!("{}", format!("voxlink: session error: {}", message).red());
            }
        }
    }

    Ok(())
}
