//! Gapless playback scheduling on a virtual output timeline.
//!
//! Decoded chunks arrive in bursts while the output clock advances in real
//! time. The scheduler keeps a moving cursor so consecutive chunks play
//! back-to-back, and supports an immediate flush when the remote side
//! signals a barge-in interruption.

use crate::audio::codec::PlaybackChunk;
use crate::error::{Result, VoxlinkError};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Identifier of one scheduled playback source.
pub type SourceId = u64;

/// Trait for platform audio output backends.
///
/// This trait allows swapping implementations (real device vs mock). All
/// times are seconds on the backend's own output clock, which starts at
/// zero and only moves forward.
pub trait AudioOut: Send {
    /// Schedule a chunk to begin playing at `when` on the output clock.
    ///
    /// Returns a handle for stopping the source early.
    fn start_at(&mut self, chunk: PlaybackChunk, when: f64) -> Result<SourceId>;

    /// Best-effort stop of a scheduled source.
    ///
    /// Fails when the source has already finished — an expected benign race
    /// during interruption handling; callers discard the result.
    fn try_stop(&mut self, id: SourceId) -> Result<()>;

    /// Drain the sources that have finished playing naturally since the
    /// last call.
    fn finished(&mut self) -> Vec<SourceId>;

    /// Current position of the output clock in seconds.
    fn position(&self) -> f64;
}

/// Schedules decoded chunks for gapless, back-to-back playback.
///
/// Maintains the next-start cursor and the set of in-flight sources. The
/// cursor never moves backward while a session is live; it resets to zero
/// only on interruption or teardown.
pub struct PlaybackScheduler {
    out: Box<dyn AudioOut>,
    next_start: f64,
    active: HashSet<SourceId>,
}

impl PlaybackScheduler {
    /// Creates a scheduler over the given output backend.
    pub fn new(out: Box<dyn AudioOut>) -> Self {
        Self {
            out,
            next_start: 0.0,
            active: HashSet::new(),
        }
    }

    /// Schedule a chunk, returning its start time on the output clock.
    ///
    /// The start is `max(cursor, clock)`: after a gap in arrivals the chunk
    /// plays immediately instead of being scheduled in the past (which
    /// would overlap in-flight audio).
    pub fn schedule(&mut self, chunk: PlaybackChunk) -> Result<f64> {
        self.reap();

        let start = self.next_start.max(self.out.position());
        let duration = chunk.duration_secs();
        let id = self.out.start_at(chunk, start)?;

        self.next_start = start + duration;
        self.active.insert(id);
        Ok(start)
    }

    /// Stop everything scheduled and reset the timeline.
    ///
    /// Called on barge-in interruption and on teardown. Stop failures are
    /// discarded: a source that finished between arrival of the
    /// interruption and the stop call is already gone.
    pub fn flush(&mut self) {
        for id in self.active.drain() {
            if let Err(e) = self.out.try_stop(id) {
                debug!(source = id, "stop after finish: {}", e);
            }
        }
        self.next_start = 0.0;
    }

    /// Remove naturally finished sources from the active set.
    pub fn reap(&mut self) {
        for id in self.out.finished() {
            self.active.remove(&id);
        }
    }

    /// Number of sources still scheduled or playing.
    pub fn active_count(&mut self) -> usize {
        self.reap();
        self.active.len()
    }

    /// The next-start cursor, in seconds on the output clock.
    pub fn next_start(&self) -> f64 {
        self.next_start
    }
}

/// State shared between `MockAudioOut` and its observation handle.
#[derive(Debug, Default)]
struct MockOutState {
    position: f64,
    next_id: SourceId,
    playing: HashSet<SourceId>,
    finished_queue: Vec<SourceId>,
    scheduled: Vec<(SourceId, f64, f64)>,
    stopped: Vec<SourceId>,
    fail_start: bool,
}

/// Mock output backend for testing.
///
/// Records every scheduled source; the clock and natural completion are
/// driven manually through the [`MockOutHandle`].
#[derive(Debug, Default)]
pub struct MockAudioOut {
    state: Arc<Mutex<MockOutState>>,
}

/// Observation and control handle for a `MockAudioOut`, usable after the
/// backend has been moved into a scheduler or session.
#[derive(Debug, Clone)]
pub struct MockOutHandle {
    state: Arc<Mutex<MockOutState>>,
}

impl MockAudioOut {
    /// Create a new mock output backend at clock position zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for driving the clock and observing scheduling.
    pub fn handle(&self) -> MockOutHandle {
        MockOutHandle {
            state: self.state.clone(),
        }
    }
}

#[allow(clippy::unwrap_used)] // test double; a poisoned lock is a failed test
impl MockOutHandle {
    /// Advance (or set) the output clock.
    pub fn set_position(&self, position: f64) {
        self.state.lock().unwrap().position = position;
    }

    /// Mark a source as naturally finished.
    pub fn finish(&self, id: SourceId) {
        let mut state = self.state.lock().unwrap();
        if state.playing.remove(&id) {
            state.finished_queue.push(id);
        }
    }

    /// Make the next `start_at` call fail.
    pub fn set_fail_start(&self, fail: bool) {
        self.state.lock().unwrap().fail_start = fail;
    }

    /// Every `(id, start, duration)` scheduled so far.
    pub fn scheduled(&self) -> Vec<(SourceId, f64, f64)> {
        self.state.lock().unwrap().scheduled.clone()
    }

    /// Sources stopped early via `try_stop`.
    pub fn stopped(&self) -> Vec<SourceId> {
        self.state.lock().unwrap().stopped.clone()
    }

    /// Sources currently playing (scheduled, not finished, not stopped).
    pub fn playing_count(&self) -> usize {
        self.state.lock().unwrap().playing.len()
    }
}

impl AudioOut for MockAudioOut {
    fn start_at(&mut self, chunk: PlaybackChunk, when: f64) -> Result<SourceId> {
        let mut state = self.state.lock().map_err(|e| VoxlinkError::Playback {
            message: format!("mock state poisoned: {}", e),
        })?;

        if state.fail_start {
            return Err(VoxlinkError::Playback {
                message: "mock start failure".to_string(),
            });
        }

        let id = state.next_id;
        state.next_id += 1;
        state.playing.insert(id);
        state.scheduled.push((id, when, chunk.duration_secs()));
        Ok(id)
    }

    fn try_stop(&mut self, id: SourceId) -> Result<()> {
        let mut state = self.state.lock().map_err(|e| VoxlinkError::Playback {
            message: format!("mock state poisoned: {}", e),
        })?;

        if state.playing.remove(&id) {
            state.stopped.push(id);
            Ok(())
        } else {
            Err(VoxlinkError::SourceNotFound { id })
        }
    }

    fn finished(&mut self) -> Vec<SourceId> {
        match self.state.lock() {
            Ok(mut state) => std::mem::take(&mut state.finished_queue),
            Err(_) => Vec::new(),
        }
    }

    fn position(&self) -> f64 {
        self.state.lock().map(|s| s.position).unwrap_or(0.0)
    }
}
