use crate::shared::frame::Frame;

use super::holistic_detection::HolisticDetection;

/// Domain interface for landmark detection.
///
/// `timestamp_ms` is a wall-clock timestamp that never decreases across
/// calls within one session; detectors running in video mode rely on it for
/// temporal smoothing. Implementations may keep state across frames, hence
/// `&mut self`.
pub trait LandmarkDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
        timestamp_ms: u64,
    ) -> Result<HolisticDetection, Box<dyn std::error::Error>>;
}
