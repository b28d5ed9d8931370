//! Default configuration constants for voxlink.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Microphone capture sample rate in Hz.
///
/// 16kHz is the standard input rate for speech services and is the rate the
/// live API expects for `audio/pcm` realtime input.
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Service playback sample rate in Hz.
///
/// The live API delivers response audio as 24kHz mono PCM.
pub const OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Number of mono samples per capture window.
///
/// Capture deliveries are reframed into fixed windows of this size before
/// encoding; at 16kHz this is 256ms of audio per wire frame.
pub const CAPTURE_WINDOW: usize = 4096;

/// Maximum number of transcript lines retained for display.
///
/// The scrollback keeps the 10 prior lines plus the newest arrival; older
/// lines are discarded, not persisted.
pub const TRANSCRIPT_SCROLLBACK: usize = 11;

/// Default model identifier for the live session.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// Default prebuilt voice for audio responses.
pub const DEFAULT_VOICE: &str = "Zephyr";

/// Default system instruction for the assistant.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an executive assistant. \
    You communicate fluently in any language the user speaks. \
    Be professional, concise, and helpful.";

/// Environment variable holding the API credential.
///
/// Read once when the live connector is constructed; never stored in the
/// config file.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Websocket endpoint for bidirectional streaming sessions.
pub const LIVE_ENDPOINT: &str = "wss://generativelanguage.googleapis.com\
    /ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Capture poll interval in milliseconds (~60Hz).
pub const CAPTURE_POLL_MS: u64 = 16;

/// Buffer size for the session event channel.
///
/// Carries both capture frames and service events into the single consumer;
/// capture frames are dropped (not blocked on) when it fills.
pub const EVENT_BUFFER: usize = 256;

/// Build the realtime input MIME type for a given capture rate.
pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}
