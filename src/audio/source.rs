//! Capture source trait and test double.

use crate::error::{Result, VoxlinkError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Trait for microphone-like capture sources.
///
/// This trait allows swapping implementations (real audio device, WAV file,
/// mock). Samples are normalized mono floats in [-1.0, 1.0] at the input
/// sample rate.
pub trait CaptureSource: Send + Sync {
    /// Start capturing audio from the source.
    fn start(&mut self) -> Result<()>;

    /// Stop capturing audio from the source.
    fn stop(&mut self) -> Result<()>;

    /// Drain whatever samples have accumulated since the last read.
    ///
    /// An empty result from a live source means no data yet; from a finite
    /// source it means the input is exhausted.
    fn read_samples(&mut self) -> Result<Vec<f32>>;

    /// Whether this source ends on its own (file/pipe) or runs until
    /// stopped (microphone).
    fn is_finite(&self) -> bool {
        false
    }
}

/// One phase of scripted mock output: `samples` returned `count` times.
#[derive(Debug, Clone)]
pub struct FramePhase {
    pub samples: Vec<f32>,
    pub count: u32,
}

/// Mock capture source for testing.
///
/// Plays through its configured phases, then returns empty reads. Start and
/// stop are observable through shared flags so tests can verify teardown
/// after the source has been moved into a session.
#[derive(Debug, Clone)]
pub struct MockCaptureSource {
    phases: Vec<FramePhase>,
    phase_index: Arc<AtomicUsize>,
    reads_in_phase: Arc<AtomicUsize>,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    finite: bool,
    should_fail_start: bool,
    error_message: String,
}

impl MockCaptureSource {
    /// Create a new mock source with a single phase of silence.
    pub fn new() -> Self {
        Self {
            phases: vec![FramePhase {
                samples: vec![0.0; 256],
                count: u32::MAX,
            }],
            phase_index: Arc::new(AtomicUsize::new(0)),
            reads_in_phase: Arc::new(AtomicUsize::new(0)),
            started: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            finite: false,
            should_fail_start: false,
            error_message: "mock capture error".to_string(),
        }
    }

    /// Configure the mock to play through the given phases, then go silent.
    pub fn with_phases(mut self, phases: Vec<FramePhase>) -> Self {
        self.phases = phases;
        self
    }

    /// Configure the mock to report itself as a finite source.
    pub fn as_finite(mut self) -> Self {
        self.finite = true;
        self
    }

    /// Configure the mock to fail on start.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the error message for failures.
    pub fn with_error_message(mut self, message: &str) -> Self {
        self.error_message = message.to_string();
        self
    }

    /// Shared flag set when `start` succeeds.
    pub fn started_flag(&self) -> Arc<AtomicBool> {
        self.started.clone()
    }

    /// Shared flag set when `stop` is called.
    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }
}

impl Default for MockCaptureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for MockCaptureSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            return Err(VoxlinkError::AudioCapture {
                message: self.error_message.clone(),
            });
        }
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<f32>> {
        let index = self.phase_index.load(Ordering::SeqCst);
        let Some(phase) = self.phases.get(index) else {
            return Ok(Vec::new());
        };

        let reads = self.reads_in_phase.fetch_add(1, Ordering::SeqCst);
        if reads as u32 + 1 >= phase.count {
            self.phase_index.store(index + 1, Ordering::SeqCst);
            self.reads_in_phase.store(0, Ordering::SeqCst);
        }
        Ok(phase.samples.clone())
    }

    fn is_finite(&self) -> bool {
        self.finite
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_plays_phases_in_order() {
        let mut source = MockCaptureSource::new().with_phases(vec![
            FramePhase {
                samples: vec![0.5; 4],
                count: 2,
            },
            FramePhase {
                samples: vec![-0.5; 4],
                count: 1,
            },
        ]);

        assert_eq!(source.read_samples().unwrap(), vec![0.5; 4]);
        assert_eq!(source.read_samples().unwrap(), vec![0.5; 4]);
        assert_eq!(source.read_samples().unwrap(), vec![-0.5; 4]);
        assert!(source.read_samples().unwrap().is_empty());
        assert!(source.read_samples().unwrap().is_empty());
    }

    #[test]
    fn test_mock_source_start_failure() {
        let mut source = MockCaptureSource::new()
            .with_start_failure()
            .with_error_message("microphone denied");

        let result = source.start();
        match result {
            Err(VoxlinkError::AudioCapture { message }) => {
                assert_eq!(message, "microphone denied");
            }
            _ => panic!("Expected AudioCapture error"),
        }
        assert!(!source.started_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_mock_source_flags_observable_after_clone() {
        let source = MockCaptureSource::new();
        let started = source.started_flag();
        let stopped = source.stopped_flag();

        let mut moved = source;
        moved.start().unwrap();
        moved.stop().unwrap();

        assert!(started.load(Ordering::SeqCst));
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_mock_source_finite_flag() {
        assert!(!MockCaptureSource::new().is_finite());
        assert!(MockCaptureSource::new().as_finite().is_finite());
    }

    #[test]
    fn test_capture_source_trait_is_object_safe() {
        let mut source: Box<dyn CaptureSource> = Box::new(MockCaptureSource::new());
        assert!(source.start().is_ok());
        assert!(source.read_samples().is_ok());
        assert!(source.stop().is_ok());
    }
}
