//! Audio capture, wire codec, and scheduled playback.
//!
//! ```text
//! ┌──────────┐   f32 windows   ┌───────────┐   base64 PCM   ┌──────────────┐
//! │ Capture  │───────────────▶│  Framer    │──────────────▶│ Live session │
//! │ (16kHz)  │                 └───────────┘                └──────┬───────┘
//! └──────────┘                                                    │ audio
//!                                                                 ▼ payloads
//! ┌──────────┐   scheduled     ┌───────────┐   f32 chunks   ┌──────────────┐
//! │ Output   │◀───────────────│ Scheduler  │◀──────────────│  Unframer    │
//! │ (24kHz)  │                 └───────────┘                └──────────────┘
//! └──────────┘
//! ```

#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod codec;
#[cfg(feature = "cpal-audio")]
pub mod output;
pub mod playback;
pub mod source;
pub mod wav;

#[cfg(feature = "cpal-audio")]
pub use capture::CpalCaptureSource;
pub use codec::{CaptureFrame, FrameAssembler, PlaybackChunk, WireAudioBlob};
#[cfg(feature = "cpal-audio")]
pub use output::CpalAudioOut;
pub use playback::{AudioOut, MockAudioOut, PlaybackScheduler, SourceId};
pub use source::{CaptureSource, FramePhase, MockCaptureSource};
pub use wav::WavCaptureSource;
