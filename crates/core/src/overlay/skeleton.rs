//! Scene-space skeleton geometry for a renderer to draw.
//!
//! Landmarks are centered on the origin with y pointing up:
//! `((x - 0.5) * W, -(y - 0.5) * H, 0)`.

use crate::shared::constants::{SCENE_HEIGHT, SCENE_WIDTH};
use crate::shared::frame_result::{BodyPart, FrameResult};
use crate::shared::landmark::{Landmark, LandmarkSet};

pub type Connection = (usize, usize);

/// COCO 17-keypoint body, as produced by YOLO-pose models.
pub const COCO_POSE_CONNECTIONS: &[Connection] = &[
    (0, 1),
    (0, 2),
    (1, 3),
    (2, 4),
    (5, 6),
    (5, 7),
    (7, 9),
    (6, 8),
    (8, 10),
    (5, 11),
    (6, 12),
    (11, 12),
    (11, 13),
    (13, 15),
    (12, 14),
    (14, 16),
];

/// MediaPipe 33-landmark body.
pub const MEDIAPIPE_POSE_CONNECTIONS: &[Connection] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 7),
    (0, 4),
    (4, 5),
    (5, 6),
    (6, 8),
    (9, 10),
    (11, 12),
    (11, 13),
    (13, 15),
    (15, 17),
    (15, 19),
    (15, 21),
    (17, 19),
    (12, 14),
    (14, 16),
    (16, 18),
    (16, 20),
    (16, 22),
    (18, 20),
    (11, 23),
    (12, 24),
    (23, 24),
    (23, 25),
    (24, 26),
    (25, 27),
    (26, 28),
    (27, 29),
    (28, 30),
    (29, 31),
    (30, 32),
    (27, 31),
    (28, 32),
];

/// 21-landmark hand: four joints per finger from the wrist, plus the palm.
pub const HAND_CONNECTIONS: &[Connection] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    (5, 9),
    (9, 13),
    (13, 17),
];

/// Eyes, brows, nose, outer lips and jawline of the 468-point face mesh.
pub const FACE_OUTLINE_CONNECTIONS: &[Connection] = &[
    // eyes
    (33, 133),
    (159, 145),
    (145, 33),
    (133, 159),
    (362, 263),
    (263, 386),
    (386, 374),
    (374, 362),
    // brows
    (65, 55),
    (55, 107),
    (107, 66),
    (66, 65),
    (295, 285),
    (285, 336),
    (336, 296),
    (296, 295),
    // nose
    (1, 4),
    (4, 5),
    (5, 195),
    (195, 197),
    // lips
    (61, 185),
    (185, 40),
    (40, 39),
    (39, 37),
    (37, 0),
    (0, 267),
    (267, 269),
    (269, 270),
    (270, 409),
    (409, 291),
    (291, 375),
    (375, 321),
    (321, 405),
    (405, 314),
    (314, 17),
    (17, 84),
    (84, 181),
    (181, 91),
    (91, 146),
    (146, 61),
    // jaw
    (10, 338),
    (338, 297),
    (297, 332),
    (332, 284),
    (284, 251),
    (251, 389),
    (389, 356),
    (356, 454),
    (454, 323),
    (323, 361),
    (361, 288),
    (288, 397),
    (397, 365),
    (365, 379),
    (379, 378),
    (378, 400),
    (400, 377),
    (377, 152),
    (152, 148),
    (148, 176),
    (176, 149),
    (149, 150),
    (150, 136),
    (136, 172),
    (172, 58),
    (58, 132),
    (132, 93),
    (93, 234),
    (234, 127),
    (127, 162),
    (162, 21),
    (21, 54),
    (54, 103),
    (103, 67),
    (67, 109),
    (109, 10),
];

/// Picks the table matching a part's landmark layout. Pose sets are told
/// apart by their length.
pub fn connections_for(part: BodyPart, set: &LandmarkSet) -> &'static [Connection] {
    match part {
        BodyPart::Pose if set.len() <= 17 => COCO_POSE_CONNECTIONS,
        BodyPart::Pose => MEDIAPIPE_POSE_CONNECTIONS,
        BodyPart::Face => FACE_OUTLINE_CONNECTIONS,
        BodyPart::LeftHand | BodyPart::RightHand => HAND_CONNECTIONS,
    }
}

pub type ScenePoint = [f32; 3];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SceneSize {
    pub width: f32,
    pub height: f32,
}

impl Default for SceneSize {
    fn default() -> Self {
        Self {
            width: SCENE_WIDTH,
            height: SCENE_HEIGHT,
        }
    }
}

impl SceneSize {
    pub fn project(&self, landmark: &Landmark) -> ScenePoint {
        [
            (landmark.x - 0.5) * self.width,
            -(landmark.y - 0.5) * self.height,
            0.0,
        ]
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartGeometry {
    pub part: BodyPart,
    pub points: Vec<ScenePoint>,
    pub bones: Vec<(ScenePoint, ScenePoint)>,
}

impl PartGeometry {
    pub fn build(part: BodyPart, set: &LandmarkSet, size: SceneSize) -> Self {
        let points: Vec<ScenePoint> = set.iter().map(|l| size.project(l)).collect();
        let bones = connections_for(part, set)
            .iter()
            .filter_map(|&(a, b)| Some((*points.get(a)?, *points.get(b)?)))
            .collect();
        Self {
            part,
            points,
            bones,
        }
    }
}

/// Points and bone segments for every non-empty part of one result.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneGeometry {
    pub parts: Vec<PartGeometry>,
}

impl SceneGeometry {
    pub fn from_result(result: &FrameResult) -> Self {
        Self::from_result_sized(result, SceneSize::default())
    }

    pub fn from_result_sized(result: &FrameResult, size: SceneSize) -> Self {
        let parts = BodyPart::ALL
            .iter()
            .map(|&part| (part, result.part(part)))
            .filter(|(_, set)| !set.is_empty())
            .map(|(part, set)| PartGeometry::build(part, set, size))
            .collect();
        Self { parts }
    }

    pub fn part(&self, part: BodyPart) -> Option<&PartGeometry> {
        self.parts.iter().find(|p| p.part == part)
    }

    pub fn bone_count(&self) -> usize {
        self.parts.iter().map(|p| p.bones.len()).sum()
    }
}
