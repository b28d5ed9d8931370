//! Session lifecycle: controller state machine and transcript scrollback.

pub mod controller;
pub mod transcript;

pub use controller::{Session, SessionNotice};
pub use transcript::{Speaker, Transcript, TranscriptLine};
