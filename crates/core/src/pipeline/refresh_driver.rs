use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::frame_loop::{FrameLoop, LoopError, TickOutcome};
use super::loop_logger::OutcomeCounts;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    LoopStopped,
    SourceEnded,
    Predicate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverSummary {
    pub counts: OutcomeCounts,
    pub last_delivered: Option<Duration>,
    pub stop_reason: StopReason,
}

/// Calls [`FrameLoop::tick`] at a fixed refresh rate on the current thread.
pub struct RefreshDriver {
    interval: Duration,
    cancelled: Arc<AtomicBool>,
}

impl RefreshDriver {
    /// Non-positive or non-finite rates are rejected by settings validation
    /// before they get here; they fall back to 1 Hz.
    pub fn new(refresh_hz: f64) -> Self {
        let hz = if refresh_hz.is_finite() && refresh_hz > 0.0 {
            refresh_hz
        } else {
            1.0
        };
        Self {
            interval: Duration::from_secs_f64(1.0 / hz),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares an externally owned cancel flag (e.g. set from a signal
    /// handler or another thread).
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Ticks until cancelled, the loop stops, the source ends, or
    /// `keep_going` returns false. Detector errors under the halt policy
    /// end the run with that error.
    pub fn run(
        &self,
        frame_loop: &mut FrameLoop,
        mut keep_going: impl FnMut(&OutcomeCounts) -> bool,
    ) -> Result<DriverSummary, LoopError> {
        let ticker = crossbeam_channel::tick(self.interval);
        let mut counts = OutcomeCounts::default();
        let mut last_delivered = None;

        let stop_reason = loop {
            if self.cancelled.load(Ordering::Relaxed) {
                break StopReason::Cancelled;
            }
            if !frame_loop.is_running() {
                break StopReason::LoopStopped;
            }
            if frame_loop.source_ended() {
                break StopReason::SourceEnded;
            }
            if !keep_going(&counts) {
                break StopReason::Predicate;
            }
            if ticker.recv().is_err() {
                break StopReason::Cancelled;
            }

            let outcome = frame_loop.tick()?;
            if let TickOutcome::Delivered(ts) = outcome {
                last_delivered = Some(ts);
            }
            counts.record(&outcome);
        };

        log::debug!(
            "refresh driver stopped ({stop_reason:?}) after {} ticks",
            counts.ticks()
        );
        Ok(DriverSummary {
            counts,
            last_delivered,
            stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::holistic_detection::HolisticDetection;
    use crate::detection::domain::landmark_detector::LandmarkDetector;
    use crate::pipeline::domain::result_sink::ResultSink;
    use crate::shared::frame::Frame;
    use crate::shared::frame_result::FrameResult;
    use crate::shared::settings::{DetectorFailurePolicy, LoopSettings};
    use crate::video::domain::video_source::{SourceReadiness, VideoSource};

    /// Shows a new frame every poll for `frames` polls, then ends.
    struct CountingSource {
        polls: u64,
        frames: u64,
    }

    impl VideoSource for CountingSource {
        fn readiness(&mut self) -> SourceReadiness {
            self.polls += 1;
            if self.polls > self.frames {
                SourceReadiness::ended()
            } else {
                SourceReadiness::ready()
            }
        }

        fn current_timestamp(&self) -> Duration {
            Duration::from_millis(self.polls * 10)
        }

        fn current_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
            Ok(Frame::new(vec![0; 3], 1, 1, 3, self.current_timestamp()))
        }

        fn release(&mut self) {}
    }

    struct StubDetector {
        fail: bool,
    }

    impl LandmarkDetector for StubDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
            _timestamp_ms: u64,
        ) -> Result<HolisticDetection, Box<dyn std::error::Error>> {
            if self.fail {
                Err("no model".into())
            } else {
                Ok(HolisticDetection::default())
            }
        }
    }

    struct Discard;

    impl ResultSink for Discard {
        fn on_frame_result(&mut self, _result: &FrameResult) {}
    }

    fn running_loop(frames: u64, fail: bool, policy: DetectorFailurePolicy) -> FrameLoop {
        let settings = LoopSettings {
            on_detector_error: policy,
            ..LoopSettings::default()
        };
        let mut frame_loop = FrameLoop::new(Discard, &settings);
        frame_loop.bind(
            Box::new(CountingSource { polls: 0, frames }),
            Box::new(StubDetector { fail }),
        );
        frame_loop.start().unwrap();
        frame_loop
    }

    #[test]
    fn test_new_converts_rate_to_interval() {
        assert_eq!(RefreshDriver::new(50.0).interval(), Duration::from_millis(20));
        assert_eq!(RefreshDriver::new(0.0).interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_stops_when_source_ends() {
        let mut frame_loop = running_loop(3, false, DetectorFailurePolicy::Skip);

        let summary = RefreshDriver::new(1000.0)
            .run(&mut frame_loop, |_| true)
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::SourceEnded);
        assert_eq!(summary.counts.delivered, 3);
        assert_eq!(summary.counts.not_ready, 1);
        assert_eq!(summary.last_delivered, Some(Duration::from_millis(30)));
    }

    #[test]
    fn test_predicate_bounds_the_run() {
        let mut frame_loop = running_loop(100, false, DetectorFailurePolicy::Skip);

        let summary = RefreshDriver::new(1000.0)
            .run(&mut frame_loop, |counts| counts.delivered < 2)
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::Predicate);
        assert_eq!(summary.counts.delivered, 2);
        assert!(frame_loop.is_running());
    }

    #[test]
    fn test_cancel_flag_stops_before_first_tick() {
        let mut frame_loop = running_loop(100, false, DetectorFailurePolicy::Skip);
        let driver = RefreshDriver::new(1000.0);
        driver.cancel_flag().store(true, Ordering::SeqCst);

        let summary = driver.run(&mut frame_loop, |_| true).unwrap();

        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.counts.ticks(), 0);
    }

    #[test]
    fn test_stopped_loop_is_not_driven() {
        let mut frame_loop = running_loop(100, false, DetectorFailurePolicy::Skip);
        frame_loop.stop();

        let summary = RefreshDriver::new(1000.0)
            .run(&mut frame_loop, |_| true)
            .unwrap();

        assert_eq!(summary.stop_reason, StopReason::LoopStopped);
        assert_eq!(summary.counts.ticks(), 0);
    }

    #[test]
    fn test_halt_error_ends_the_run() {
        let mut frame_loop = running_loop(100, true, DetectorFailurePolicy::Halt);

        let result = RefreshDriver::new(1000.0).run(&mut frame_loop, |_| true);

        assert!(matches!(result, Err(LoopError::Detector { .. })));
        assert!(!frame_loop.is_running());
    }

    #[test]
    fn test_skip_policy_keeps_driving() {
        let mut frame_loop = running_loop(4, true, DetectorFailurePolicy::Skip);

        let summary = RefreshDriver::new(1000.0)
            .run(&mut frame_loop, |_| true)
            .unwrap();

        assert_eq!(summary.counts.failed, 4);
        assert_eq!(summary.stop_reason, StopReason::SourceEnded);
    }
}
