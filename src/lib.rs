//! voxlink - Real-time voice session client
//!
//! Streams microphone audio to a conversational AI service over a
//! bidirectional session, plays streamed replies back gaplessly, and keeps
//! a bounded rolling transcript.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod live;
pub mod session;

// L4 composition root - needs everything
#[cfg(all(feature = "cpal-audio", feature = "cli"))]
pub mod app;

// Core traits (capture → session → playback)
pub use audio::playback::{AudioOut, MockAudioOut, PlaybackScheduler, SourceId};
pub use audio::source::{CaptureSource, MockCaptureSource};
pub use live::session::{
    LiveConnector, LiveSession, MockLiveConnector, ServiceEvent, SessionSetup,
};

// Wire codec
pub use audio::codec::{CaptureFrame, FrameAssembler, PlaybackChunk, WireAudioBlob};

// Session controller
pub use session::controller::{Session, SessionNotice};
pub use session::transcript::{Speaker, Transcript, TranscriptLine};

// Error handling
pub use error::{Result, VoxlinkError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns "x.y.z (abcdef0)" when built from a git checkout, "x.y.z"
/// otherwise.
pub fn version() -> String {
    match option_env!("GIT_HASH") {
        Some(hash) => format!("{} ({})", env!("CARGO_PKG_VERSION"), hash),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_starts_with_package_version() {
        assert!(version().starts_with(env!("CARGO_PKG_VERSION")));
    }
}
