use std::collections::HashMap;
use std::time::Duration;

use crate::detection::domain::holistic_detection::HolisticDetection;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::frame::Frame;
use crate::shared::frame_result::FrameResult;
use crate::shared::landmark::LandmarkSet;

/// Replays recorded landmark results by frame timestamp.
///
/// Lets a recording made from one session drive the loop again without a
/// model. Recordings keep fractional milliseconds; lookups round both
/// sides to the nearest whole millisecond so decoder jitter below that
/// still matches.
pub struct ReplayDetector {
    results: HashMap<u64, FrameResult>,
}

impl ReplayDetector {
    pub fn new(results: impl IntoIterator<Item = FrameResult>) -> Self {
        let results = results
            .into_iter()
            .map(|r| (millis_key(r.timestamp()), r))
            .collect();
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

fn millis_key(timestamp: Duration) -> u64 {
    (timestamp.as_secs_f64() * 1000.0).round() as u64
}

fn reported(set: &LandmarkSet) -> Option<Vec<LandmarkSet>> {
    if set.is_empty() {
        Some(Vec::new())
    } else {
        Some(vec![set.clone()])
    }
}

impl LandmarkDetector for ReplayDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        _timestamp_ms: u64,
    ) -> Result<HolisticDetection, Box<dyn std::error::Error>> {
        let Some(result) = self.results.get(&millis_key(frame.timestamp())) else {
            return Ok(HolisticDetection::default());
        };
        Ok(HolisticDetection {
            pose: reported(result.pose()),
            face: reported(result.face()),
            left_hand: reported(result.left_hand()),
            right_hand: reported(result.right_hand()),
        })
    }
}
