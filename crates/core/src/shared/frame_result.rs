use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::landmark::{Landmark, LandmarkSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyPart {
    Pose,
    Face,
    LeftHand,
    RightHand,
}

impl BodyPart {
    pub const ALL: [BodyPart; 4] = [
        BodyPart::Pose,
        BodyPart::Face,
        BodyPart::LeftHand,
        BodyPart::RightHand,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            BodyPart::Pose => "pose",
            BodyPart::Face => "face",
            BodyPart::LeftHand => "left_hand",
            BodyPart::RightHand => "right_hand",
        }
    }
}

/// Landmarks detected in one source frame.
///
/// Every body part is always present; a part that was not detected holds an
/// empty [`LandmarkSet`]. Built once per processed frame and never mutated.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    #[serde(with = "duration_millis")]
    timestamp: Duration,
    pose: LandmarkSet,
    face: LandmarkSet,
    left_hand: LandmarkSet,
    right_hand: LandmarkSet,
}

impl FrameResult {
    pub fn new(
        timestamp: Duration,
        pose: LandmarkSet,
        face: LandmarkSet,
        left_hand: LandmarkSet,
        right_hand: LandmarkSet,
    ) -> Self {
        Self {
            timestamp,
            pose,
            face,
            left_hand,
            right_hand,
        }
    }

    /// Presentation timestamp of the source frame.
    pub fn timestamp(&self) -> Duration {
        self.timestamp
    }

    pub fn pose(&self) -> &LandmarkSet {
        &self.pose
    }

    pub fn face(&self) -> &LandmarkSet {
        &self.face
    }

    pub fn left_hand(&self) -> &LandmarkSet {
        &self.left_hand
    }

    pub fn right_hand(&self) -> &LandmarkSet {
        &self.right_hand
    }

    pub fn part(&self, part: BodyPart) -> &LandmarkSet {
        match part {
            BodyPart::Pose => &self.pose,
            BodyPart::Face => &self.face,
            BodyPart::LeftHand => &self.left_hand,
            BodyPart::RightHand => &self.right_hand,
        }
    }

    pub fn is_empty(&self) -> bool {
        BodyPart::ALL.iter().all(|p| self.part(*p).is_empty())
    }

    pub fn landmark_count(&self) -> usize {
        BodyPart::ALL.iter().map(|p| self.part(*p).len()).sum()
    }

    /// Concatenates all parts in pose, face, left hand, right hand order.
    pub fn flatten(&self) -> Vec<Landmark> {
        let mut all = Vec::with_capacity(self.landmark_count());
        for part in BodyPart::ALL {
            all.extend_from_slice(self.part(part).points());
        }
        all
    }
}

/// Timestamps are stored as fractional milliseconds in recordings.
mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1000.0)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        if !millis.is_finite() || millis < 0.0 {
            return Err(serde::de::Error::custom(format!(
                "timestamp must be a non-negative number of milliseconds, got {millis}"
            )));
        }
        Ok(Duration::from_nanos((millis * 1_000_000.0).round() as u64))
    }
}
