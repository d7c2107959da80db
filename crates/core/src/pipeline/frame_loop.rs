use std::time::{Duration, Instant};

use thiserror::Error;

use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::settings::{DetectorFailurePolicy, LoopSettings};
use crate::video::domain::video_source::VideoSource;

use super::domain::clock::{Clock, SystemClock};
use super::domain::result_sink::ResultSink;
use super::loop_logger::{LoopLogger, NullLoopLogger};

#[derive(Error, Debug)]
pub enum LoopError {
    #[error("frame loop has no video source and detector bound")]
    NotInitialized,
    #[error("detector failed on frame at {timestamp:?}: {message}")]
    Detector { timestamp: Duration, message: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopStatus {
    Uninitialized,
    Ready,
    Running,
    Stopped,
}

/// Identifies one scheduled iteration. A new handle is issued every time
/// the loop reschedules itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TickHandle(u64);

/// What a single tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing was scheduled; the loop is stopped or was never started.
    Idle,
    /// The source was paused, ended, buffering, or its frame unreadable.
    NotReady,
    /// The frame on display was already processed.
    Duplicate,
    /// A result for the frame at this timestamp reached the sink.
    Delivered(Duration),
    /// The detector failed and the frame was skipped.
    DetectorFailed,
}

/// Bookkeeping owned by the loop alone.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopState {
    last_timestamp: Option<Duration>,
    running: bool,
    pending: Option<TickHandle>,
}

impl LoopState {
    /// Presentation timestamp of the last frame handed to the detector.
    pub fn last_timestamp(&self) -> Option<Duration> {
        self.last_timestamp
    }

    pub fn running(&self) -> bool {
        self.running
    }

    pub fn pending(&self) -> Option<TickHandle> {
        self.pending
    }
}

struct Binding {
    source: Box<dyn VideoSource>,
    detector: Box<dyn LandmarkDetector>,
}

/// Bridges a continuously playing video source and a per-frame detector.
///
/// The host calls [`FrameLoop::tick`] once per display refresh. Each tick
/// runs at most one iteration, and an iteration only reaches the detector
/// when the source shows a frame newer than the last one processed, so
/// results leave the loop in strictly increasing timestamp order.
pub struct FrameLoop {
    binding: Option<Binding>,
    sink: Box<dyn ResultSink>,
    clock: Box<dyn Clock>,
    logger: Box<dyn LoopLogger>,
    policy: DetectorFailurePolicy,
    status: LoopStatus,
    state: LoopState,
    next_handle: u64,
    last_detector_ms: Option<u64>,
    source_ended: bool,
}

impl FrameLoop {
    pub fn new(sink: impl ResultSink + 'static, settings: &LoopSettings) -> Self {
        Self {
            binding: None,
            sink: Box::new(sink),
            clock: Box::new(SystemClock::new()),
            logger: Box::new(NullLoopLogger),
            policy: settings.on_detector_error,
            status: LoopStatus::Uninitialized,
            state: LoopState::default(),
            next_handle: 0,
            last_detector_ms: None,
            source_ended: false,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_logger(mut self, logger: impl LoopLogger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    /// Attaches a source and detector, replacing any previous pair.
    ///
    /// A replaced source is dropped, not released. Use [`FrameLoop::unbind`]
    /// first when the old source needs explicit cleanup.
    pub fn bind(&mut self, source: Box<dyn VideoSource>, detector: Box<dyn LandmarkDetector>) {
        self.stop();
        self.binding = Some(Binding { source, detector });
        self.state.last_timestamp = None;
        self.last_detector_ms = None;
        self.source_ended = false;
        self.status = LoopStatus::Ready;
    }

    /// Stops the loop and hands the source back to its owner.
    pub fn unbind(&mut self) -> Option<Box<dyn VideoSource>> {
        self.stop();
        self.status = LoopStatus::Uninitialized;
        self.binding.take().map(|b| b.source)
    }

    /// Stops the loop, releases the bound source and drops the binding.
    /// The loop must be bound again before it can restart.
    pub fn release(&mut self) {
        self.stop();
        self.status = LoopStatus::Uninitialized;
        if let Some(mut binding) = self.binding.take() {
            binding.source.release();
        }
    }

    /// Schedules the first iteration. Restarting a running loop stops it
    /// first, so there is never more than one pending tick.
    pub fn start(&mut self) -> Result<(), LoopError> {
        if self.binding.is_none() {
            return Err(LoopError::NotInitialized);
        }
        if self.state.running {
            self.stop();
        }
        self.state.pending = Some(self.issue_handle());
        self.state.running = true;
        self.status = LoopStatus::Running;
        self.logger.info("frame loop started");
        Ok(())
    }

    /// Cancels the pending tick. Idempotent; once this returns the detector
    /// and sink are not called again until the next `start`.
    pub fn stop(&mut self) {
        self.state.pending = None;
        if self.state.running {
            self.state.running = false;
            self.status = LoopStatus::Stopped;
            self.logger.info("frame loop stopped");
        }
    }

    /// Runs the pending iteration, if any.
    ///
    /// Returns an error only when the detector fails under
    /// [`DetectorFailurePolicy::Halt`]; the loop is stopped by then.
    pub fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        if self.state.pending.take().is_none() {
            self.logger.tick_outcome(&TickOutcome::Idle);
            return Ok(TickOutcome::Idle);
        }

        match self.iterate() {
            Ok(outcome) => {
                self.state.pending = Some(self.issue_handle());
                self.logger.tick_outcome(&outcome);
                Ok(outcome)
            }
            Err(e) => {
                self.stop();
                Err(e)
            }
        }
    }

    fn iterate(&mut self) -> Result<TickOutcome, LoopError> {
        let Some(binding) = self.binding.as_mut() else {
            return Ok(TickOutcome::Idle);
        };

        let readiness = binding.source.readiness();
        self.source_ended = readiness.ended;
        if !readiness.is_ready() {
            return Ok(TickOutcome::NotReady);
        }

        // Cheap pre-check; the frame's own timestamp decides below.
        let shown = binding.source.current_timestamp();
        let last = self.state.last_timestamp;
        if last.is_some_and(|last| shown <= last) {
            return Ok(TickOutcome::Duplicate);
        }

        let frame = match binding.source.current_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("frame at {shown:?} unreadable, retrying next tick: {e}");
                return Ok(TickOutcome::NotReady);
            }
        };
        // A live source may have moved on between the two reads.
        let timestamp = frame.timestamp();
        if last.is_some_and(|last| timestamp <= last) {
            return Ok(TickOutcome::Duplicate);
        }
        self.state.last_timestamp = Some(timestamp);

        let now = self.clock.now_millis();
        let detector_ms = self.last_detector_ms.map_or(now, |last| now.max(last));
        self.last_detector_ms = Some(detector_ms);

        let detect_start = Instant::now();
        let detection = binding.detector.detect(&frame, detector_ms);
        self.logger
            .timing("detect", detect_start.elapsed().as_secs_f64() * 1000.0);

        let detection = match detection {
            Ok(detection) => detection,
            Err(e) => {
                return match self.policy {
                    DetectorFailurePolicy::Skip => {
                        log::warn!("detector failed on frame at {timestamp:?}, skipping: {e}");
                        Ok(TickOutcome::DetectorFailed)
                    }
                    DetectorFailurePolicy::Halt => Err(LoopError::Detector {
                        timestamp,
                        message: e.to_string(),
                    }),
                };
            }
        };

        let result = detection.into_frame_result(timestamp);
        self.logger
            .metric("landmarks", result.landmark_count() as f64);

        let sink_start = Instant::now();
        self.sink.on_frame_result(&result);
        self.logger
            .timing("sink", sink_start.elapsed().as_secs_f64() * 1000.0);

        Ok(TickOutcome::Delivered(timestamp))
    }

    fn issue_handle(&mut self) -> TickHandle {
        self.next_handle += 1;
        TickHandle(self.next_handle)
    }

    pub fn status(&self) -> LoopStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    pub fn pending_tick(&self) -> Option<TickHandle> {
        self.state.pending
    }

    pub fn last_processed(&self) -> Option<Duration> {
        self.state.last_timestamp
    }

    /// Whether the source reported end of playback on the latest tick.
    pub fn source_ended(&self) -> bool {
        self.source_ended
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn logger(&self) -> &dyn LoopLogger {
        self.logger.as_ref()
    }
}
