//! End-to-end session tests over mock capture, connector, and output.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use voxlink::audio::codec::decode_blob;
use voxlink::audio::playback::MockAudioOut;
use voxlink::audio::source::{FramePhase, MockCaptureSource};
use voxlink::config::Config;
use voxlink::live::session::{MockLiveConnector, ServiceEvent};
use voxlink::session::controller::Session;

/// Poll until `condition` holds or the deadline passes.
async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            Instant::now() < deadline,
            "timed out waiting for: {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Raw little-endian PCM bytes for `frames` silent mono samples.
fn pcm_bytes(frames: usize) -> Vec<u8> {
    vec![0u8; frames * 2]
}

fn talking_capture() -> MockCaptureSource {
    // 8× 1024 samples: enough for two full 4096-sample capture windows.
    MockCaptureSource::new().with_phases(vec![FramePhase {
        samples: vec![0.25; 1024],
        count: 8,
    }])
}

#[tokio::test]
async fn captured_audio_is_framed_and_sent() {
    let connector = MockLiveConnector::new();
    let live = connector.handle();
    let mut session = Session::new(&Config::default());

    session
        .start(
            Box::new(talking_capture()),
            &connector,
            Box::new(MockAudioOut::new()),
        )
        .await
        .unwrap();

    wait_until("two capture windows sent", || live.sent_count() >= 2).await;

    let sent = live.sent();
    assert_eq!(sent[0].mime_type, "audio/pcm;rate=16000");

    // Each wire blob decodes back to one full window within quantization error.
    let chunk = decode_blob(&sent[0].data, 16000, 1).unwrap();
    assert_eq!(chunk.frame_count(), 4096);
    assert!(chunk.channel(0).iter().all(|s| (s - 0.25).abs() <= 1.0 / 32768.0));

    session.stop().await;
}

#[tokio::test]
async fn service_audio_schedules_gapless() {
    let connector = MockLiveConnector::new();
    let live = connector.handle();
    let out = MockAudioOut::new();
    let playback = out.handle();
    let mut session = Session::new(&Config::default());

    session
        .start(
            Box::new(MockCaptureSource::new()),
            &connector,
            Box::new(out),
        )
        .await
        .unwrap();

    // Three chunks: 0.5s, 0.25s, 1.0s at 24kHz.
    for frames in [12000, 6000, 24000] {
        live.emit(ServiceEvent::Audio(pcm_bytes(frames))).await;
    }

    wait_until("three chunks scheduled", || playback.scheduled().len() == 3).await;

    let scheduled = playback.scheduled();
    let expected_starts = [0.0, 0.5, 0.75];
    for ((_, start, _), expected) in scheduled.iter().zip(expected_starts) {
        assert!(
            (start - expected).abs() < 1e-9,
            "expected start {expected}, got {start}"
        );
    }

    session.stop().await;
}

#[tokio::test]
async fn interruption_flushes_all_scheduled_playback() {
    let connector = MockLiveConnector::new();
    let live = connector.handle();
    let out = MockAudioOut::new();
    let playback = out.handle();
    let mut session = Session::new(&Config::default());

    session
        .start(
            Box::new(MockCaptureSource::new()),
            &connector,
            Box::new(out),
        )
        .await
        .unwrap();

    for _ in 0..3 {
        live.emit(ServiceEvent::Audio(pcm_bytes(12000))).await;
    }
    wait_until("chunks scheduled", || playback.scheduled().len() == 3).await;

    live.emit(ServiceEvent::Interrupted).await;
    wait_until("all sources stopped", || playback.playing_count() == 0).await;
    assert_eq!(playback.stopped().len(), 3);

    // The next chunk after the flush restarts from the clock, not the old
    // cursor.
    playback.set_position(0.1);
    live.emit(ServiceEvent::Audio(pcm_bytes(6000))).await;
    wait_until("post-flush chunk scheduled", || {
        playback.scheduled().len() == 4
    })
    .await;

    let (_, start, _) = playback.scheduled()[3];
    assert!((start - 0.1).abs() < 1e-9);

    session.stop().await;
}

#[tokio::test]
async fn transcript_is_bounded_to_last_eleven() {
    let connector = MockLiveConnector::new();
    let live = connector.handle();
    let mut session = Session::new(&Config::default());

    session
        .start(
            Box::new(MockCaptureSource::new()),
            &connector,
            Box::new(MockAudioOut::new()),
        )
        .await
        .unwrap();

    for i in 0..15 {
        live.emit(ServiceEvent::OutputTranscript(format!("fragment {}", i)))
            .await;
    }

    wait_until("scrollback filled", || {
        session.transcript_lines().len() == 11
    })
    .await;

    let lines = session.transcript_lines();
    assert_eq!(lines[0], "Assistant: fragment 4");
    assert_eq!(lines[10], "Assistant: fragment 14");

    session.stop().await;
    assert!(session.transcript_lines().is_empty());
}

#[tokio::test]
async fn both_speakers_appear_in_arrival_order() {
    let connector = MockLiveConnector::new();
    let live = connector.handle();
    let mut session = Session::new(&Config::default());

    session
        .start(
            Box::new(MockCaptureSource::new()),
            &connector,
            Box::new(MockAudioOut::new()),
        )
        .await
        .unwrap();

    live.emit(ServiceEvent::InputTranscript("hello".to_string()))
        .await;
    live.emit(ServiceEvent::OutputTranscript("hi, how can I help?".to_string()))
        .await;

    wait_until("two lines", || session.transcript_lines().len() == 2).await;
    assert_eq!(
        session.transcript_lines(),
        vec![
            "User: hello".to_string(),
            "Assistant: hi, how can I help?".to_string(),
        ]
    );

    session.stop().await;
}

#[tokio::test]
async fn remote_close_tears_the_session_down() {
    let connector = MockLiveConnector::new();
    let live = connector.handle();
    let capture = talking_capture();
    let capture_stopped = capture.stopped_flag();
    let mut session = Session::new(&Config::default());

    session
        .start(Box::new(capture), &connector, Box::new(MockAudioOut::new()))
        .await
        .unwrap();
    assert!(session.is_active());

    live.emit(ServiceEvent::Closed {
        reason: Some("server going away".to_string()),
    })
    .await;

    wait_until("session inactive", || !session.is_active()).await;
    wait_until("capture released", || {
        capture_stopped.load(Ordering::SeqCst)
    })
    .await;
    assert!(live.closed());
    assert!(session.transcript_lines().is_empty());

    // An explicit stop afterwards is a no-op, not an error.
    session.stop().await;
}

#[tokio::test]
async fn transport_error_reaches_the_same_teardown() {
    let connector = MockLiveConnector::new();
    let live = connector.handle();
    let mut session = Session::new(&Config::default());

    session
        .start(
            Box::new(MockCaptureSource::new()),
            &connector,
            Box::new(MockAudioOut::new()),
        )
        .await
        .unwrap();

    live.emit(ServiceEvent::Error("connection reset".to_string()))
        .await;

    wait_until("session inactive", || !session.is_active()).await;
    assert!(live.closed());

    session.stop().await;
}

#[tokio::test]
async fn session_restarts_cleanly_after_remote_close() {
    let connector = MockLiveConnector::new();
    let live = connector.handle();
    let mut session = Session::new(&Config::default());

    session
        .start(
            Box::new(MockCaptureSource::new()),
            &connector,
            Box::new(MockAudioOut::new()),
        )
        .await
        .unwrap();

    live.emit(ServiceEvent::Closed { reason: None }).await;
    wait_until("session inactive", || !session.is_active()).await;

    // No explicit stop: start() reaps the finished session and reconnects.
    session
        .start(
            Box::new(MockCaptureSource::new()),
            &connector,
            Box::new(MockAudioOut::new()),
        )
        .await
        .unwrap();
    assert!(session.is_active());
    assert_eq!(live.connects(), 2);

    session.stop().await;
}

#[tokio::test]
async fn finite_capture_source_does_not_end_the_session() {
    let connector = MockLiveConnector::new();
    let live = connector.handle();
    let capture = MockCaptureSource::new()
        .with_phases(vec![FramePhase {
            samples: vec![0.1; 4096],
            count: 1,
        }])
        .as_finite();
    let mut session = Session::new(&Config::default());

    session
        .start(Box::new(capture), &connector, Box::new(MockAudioOut::new()))
        .await
        .unwrap();

    wait_until("window sent", || live.sent_count() >= 1).await;

    // The session outlives the exhausted source: responses can still arrive.
    live.emit(ServiceEvent::OutputTranscript("done reading".to_string()))
        .await;
    wait_until("line arrived", || session.transcript_lines().len() == 1).await;
    assert!(session.is_active());

    session.stop().await;
}
