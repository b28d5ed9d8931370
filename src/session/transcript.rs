//! Bounded transcript scrollback for a live session.

use crate::defaults;
use std::collections::VecDeque;

/// Which side of the conversation a line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    /// Display prefix for this speaker.
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "User",
            Speaker::Assistant => "Assistant",
        }
    }
}

/// One transcript fragment, kept in arrival order.
///
/// Fragments are not coalesced: every arrival is one line, however short.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    pub speaker: Speaker,
    pub text: String,
}

impl TranscriptLine {
    /// Render as the display form, e.g. `Assistant: hello`.
    pub fn render(&self) -> String {
        format!("{}: {}", self.speaker.label(), self.text)
    }
}

/// Rolling scrollback of the most recent transcript lines.
///
/// Older lines are discarded, not persisted. Cleared entirely when the
/// session stops.
#[derive(Debug)]
pub struct Transcript {
    lines: VecDeque<TranscriptLine>,
    capacity: usize,
}

impl Transcript {
    /// Create a transcript with the default scrollback depth.
    pub fn new() -> Self {
        Self::with_capacity(defaults::TRANSCRIPT_SCROLLBACK)
    }

    /// Create a transcript retaining at most `capacity` lines.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a fragment, discarding the oldest line when full.
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) {
        while self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(TranscriptLine {
            speaker,
            text: text.into(),
        });
    }

    /// Rendered snapshot of the scrollback, oldest first.
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().map(TranscriptLine::render).collect()
    }

    /// Number of retained lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the scrollback is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Discard everything.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_render() {
        let mut transcript = Transcript::new();
        transcript.push(Speaker::User, "hello");
        transcript.push(Speaker::Assistant, "hi there");

        assert_eq!(
            transcript.lines(),
            vec!["User: hello".to_string(), "Assistant: hi there".to_string()]
        );
    }

    #[test]
    fn test_scrollback_keeps_last_eleven_of_fifteen() {
        let mut transcript = Transcript::new();
        for i in 0..15 {
            transcript.push(Speaker::Assistant, format!("line {}", i));
        }

        let lines = transcript.lines();
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], "Assistant: line 4");
        assert_eq!(lines[10], "Assistant: line 14");
    }

    #[test]
    fn test_fragments_are_not_coalesced() {
        let mut transcript = Transcript::new();
        transcript.push(Speaker::Assistant, "Hel");
        transcript.push(Speaker::Assistant, "lo");

        assert_eq!(transcript.len(), 2);
        assert_eq!(
            transcript.lines(),
            vec!["Assistant: Hel".to_string(), "Assistant: lo".to_string()]
        );
    }

    #[test]
    fn test_empty_fragment_is_a_line() {
        let mut transcript = Transcript::new();
        transcript.push(Speaker::User, "");
        assert_eq!(transcript.lines(), vec!["User: ".to_string()]);
    }

    #[test]
    fn test_clear() {
        let mut transcript = Transcript::new();
        transcript.push(Speaker::User, "hello");
        assert!(!transcript.is_empty());

        transcript.clear();
        assert!(transcript.is_empty());
        assert!(transcript.lines().is_empty());
    }

    #[test]
    fn test_custom_capacity() {
        let mut transcript = Transcript::with_capacity(2);
        transcript.push(Speaker::User, "a");
        transcript.push(Speaker::User, "b");
        transcript.push(Speaker::User, "c");

        assert_eq!(
            transcript.lines(),
            vec!["User: b".to_string(), "User: c".to_string()]
        );
    }

    #[test]
    fn test_speaker_labels() {
        assert_eq!(Speaker::User.label(), "User");
        assert_eq!(Speaker::Assistant.label(), "Assistant");
    }
}
