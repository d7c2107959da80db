use std::time::Duration;

use crate::shared::frame_result::{BodyPart, FrameResult};
use crate::shared::landmark::LandmarkSet;

/// Raw detector output for one frame.
///
/// Each body part lists zero or more candidate instances, most prominent
/// first. `None` means the detector does not report that part at all;
/// `Some(vec![])` means it looked and found nothing. Both normalize to an
/// empty set.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HolisticDetection {
    pub pose: Option<Vec<LandmarkSet>>,
    pub face: Option<Vec<LandmarkSet>>,
    pub left_hand: Option<Vec<LandmarkSet>>,
    pub right_hand: Option<Vec<LandmarkSet>>,
}

impl HolisticDetection {
    pub fn candidates(&self, part: BodyPart) -> Option<&[LandmarkSet]> {
        match part {
            BodyPart::Pose => self.pose.as_deref(),
            BodyPart::Face => self.face.as_deref(),
            BodyPart::LeftHand => self.left_hand.as_deref(),
            BodyPart::RightHand => self.right_hand.as_deref(),
        }
    }

    /// Keeps only the primary candidate of each part.
    ///
    /// Not a multi-subject tracker: secondary bodies, faces and hands are
    /// dropped.
    pub fn into_frame_result(self, timestamp: Duration) -> FrameResult {
        FrameResult::new(
            timestamp,
            primary(self.pose),
            primary(self.face),
            primary(self.left_hand),
            primary(self.right_hand),
        )
    }
}

fn primary(candidates: Option<Vec<LandmarkSet>>) -> LandmarkSet {
    candidates
        .and_then(|c| c.into_iter().next())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::landmark::Landmark;

    fn set(x: f32) -> LandmarkSet {
        LandmarkSet::new(vec![Landmark::new(x, x, 0.0), Landmark::new(x, x, 0.1)])
    }

    #[test]
    fn test_empty_pose_and_single_face() {
        let detection = HolisticDetection {
            pose: Some(vec![]),
            face: Some(vec![set(0.3)]),
            ..Default::default()
        };

        let result = detection.into_frame_result(Duration::from_millis(5));

        assert!(result.pose().is_empty());
        assert_eq!(result.face(), &set(0.3));
        assert!(result.left_hand().is_empty());
        assert!(result.right_hand().is_empty());
        assert_eq!(result.timestamp(), Duration::from_millis(5));
    }

    #[test]
    fn test_unreported_parts_become_empty_sets() {
        let result = HolisticDetection::default().into_frame_result(Duration::ZERO);
        assert!(result.is_empty());
    }

    #[test]
    fn test_only_first_candidate_is_kept() {
        let detection = HolisticDetection {
            pose: Some(vec![set(0.1), set(0.9)]),
            left_hand: Some(vec![set(0.4), set(0.5)]),
            ..Default::default()
        };

        let result = detection.into_frame_result(Duration::ZERO);

        assert_eq!(result.pose(), &set(0.1));
        assert_eq!(result.left_hand(), &set(0.4));
    }

    #[test]
    fn test_candidates_distinguishes_unreported_from_empty() {
        let detection = HolisticDetection {
            pose: Some(vec![]),
            ..Default::default()
        };
        assert_eq!(detection.candidates(BodyPart::Pose), Some(&[][..]));
        assert_eq!(detection.candidates(BodyPart::Face), None);
    }
}
