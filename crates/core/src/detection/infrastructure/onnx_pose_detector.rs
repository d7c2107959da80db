//! YOLO-pose landmark detector using ONNX Runtime via `ort`.
//!
//! Reports the 17 COCO body keypoints for every person found, most
//! confident first. Face and hand landmarks are not produced by this model.

use std::cmp::Ordering;
use std::path::Path;

use ndarray::Array4;

use crate::detection::domain::holistic_detection::HolisticDetection;
use crate::detection::domain::landmark_detector::LandmarkDetector;
use crate::shared::frame::Frame;
use crate::shared::landmark::{Landmark, LandmarkSet};

use super::execution_provider::preferred_execution_providers;

/// Fallback input resolution when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

const NMS_IOU_THRESH: f64 = 0.45;

/// COCO keypoint count of the YOLO-pose head.
pub const POSE_KEYPOINTS: usize = 17;

/// Box (4) + person score (1) + keypoints (x, y, conf).
const ROW_LEN: usize = 5 + POSE_KEYPOINTS * 3;

pub struct OnnxPoseDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxPoseDetector {
    /// Loads a YOLO-pose model. The square input size is read from the
    /// model's NCHW input shape when it is static.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::info!(
            "loaded pose model {} (input {input_size}x{input_size}, confidence {confidence})",
            model_path.display()
        );

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl LandmarkDetector for OnnxPoseDetector {
    fn detect(
        &mut self,
        frame: &Frame,
        _timestamp_ms: u64,
    ) -> Result<HolisticDetection, Box<dyn std::error::Error>> {
        let mut letterboxed = Letterbox::of(frame, self.input_size);

        let input = ort::value::Tensor::from_array(std::mem::take(&mut letterboxed.tensor))?;
        let outputs = self.session.run(ort::inputs![input])?;
        if outputs.len() == 0 {
            return Err("pose model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or("pose output tensor is not contiguous")?;

        let rows = OutputRows::new(&shape, data)?;
        let mut candidates = rows.candidates(self.confidence, &letterboxed);
        let people = nms(&mut candidates, NMS_IOU_THRESH);

        let pose = people
            .iter()
            .map(|p| p.to_landmarks(frame.width(), frame.height()))
            .collect();

        Ok(HolisticDetection {
            pose: Some(pose),
            ..Default::default()
        })
    }
}

/// A frame resized into a square, gray-padded model input.
struct Letterbox {
    tensor: Array4<f32>,
    scale: f64,
    pad_x: f64,
    pad_y: f64,
}

impl Letterbox {
    fn of(frame: &Frame, target_size: u32) -> Self {
        let fw = f64::from(frame.width());
        let fh = f64::from(frame.height());
        let target = f64::from(target_size);

        let scale = (target / fw).min(target / fh);
        let new_w = ((fw * scale).round() as u32).min(target_size);
        let new_h = ((fh * scale).round() as u32).min(target_size);
        let pad_x = (target_size - new_w) / 2;
        let pad_y = (target_size - new_h) / 2;

        let size = target_size as usize;
        let mut tensor = Array4::<f32>::from_elem((1, 3, size, size), 114.0 / 255.0);

        let src = frame.as_ndarray();
        let max_y = frame.height().saturating_sub(1) as usize;
        let max_x = frame.width().saturating_sub(1) as usize;
        for y in 0..new_h as usize {
            let sy = ((y as f64 / scale) as usize).min(max_y);
            for x in 0..new_w as usize {
                let sx = ((x as f64 / scale) as usize).min(max_x);
                for c in 0..3 {
                    tensor[[0, c, pad_y as usize + y, pad_x as usize + x]] =
                        f32::from(src[[sy, sx, c]]) / 255.0;
                }
            }
        }

        Self {
            tensor,
            scale,
            pad_x: f64::from(pad_x),
            pad_y: f64::from(pad_y),
        }
    }

    /// Maps a point in model input space back to frame pixels.
    fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// View over a YOLO-pose output, either `[1, features, detections]` or
/// `[1, detections, features]`.
struct OutputRows<'a> {
    data: &'a [f32],
    detections: usize,
    features: usize,
    transposed: bool,
}

impl<'a> OutputRows<'a> {
    fn new(shape: &[usize], data: &'a [f32]) -> Result<Self, Box<dyn std::error::Error>> {
        if shape.len() != 3 {
            return Err(format!("unexpected pose output shape {shape:?}").into());
        }
        let transposed = shape[1] < shape[2];
        let (detections, features) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if features < ROW_LEN {
            return Err(format!(
                "pose output has {features} features per detection, expected {ROW_LEN}"
            )
            .into());
        }
        Ok(Self {
            data,
            detections,
            features,
            transposed,
        })
    }

    fn value(&self, detection: usize, feature: usize) -> f64 {
        let idx = if self.transposed {
            feature * self.detections + detection
        } else {
            detection * self.features + feature
        };
        f64::from(self.data[idx])
    }

    fn candidates(&self, min_score: f64, letterbox: &Letterbox) -> Vec<PoseCandidate> {
        (0..self.detections)
            .filter(|&i| self.value(i, 4) >= min_score)
            .map(|i| {
                let (cx, cy, w, h) = (
                    self.value(i, 0),
                    self.value(i, 1),
                    self.value(i, 2),
                    self.value(i, 3),
                );
                let (x1, y1) = letterbox.to_frame(cx - w / 2.0, cy - h / 2.0);
                let (x2, y2) = letterbox.to_frame(cx + w / 2.0, cy + h / 2.0);
                let keypoints = (0..POSE_KEYPOINTS)
                    .map(|k| letterbox.to_frame(self.value(i, 5 + k * 3), self.value(i, 6 + k * 3)))
                    .collect();
                PoseCandidate {
                    bbox: [x1, y1, x2, y2],
                    score: self.value(i, 4),
                    keypoints,
                }
            })
            .collect()
    }
}

#[derive(Clone, Debug)]
struct PoseCandidate {
    bbox: [f64; 4],
    score: f64,
    /// Frame-pixel keypoints in COCO order.
    keypoints: Vec<(f64, f64)>,
}

impl PoseCandidate {
    fn to_landmarks(&self, width: u32, height: u32) -> LandmarkSet {
        self.keypoints
            .iter()
            .map(|&(x, y)| Landmark::from_pixels(x, y, width, height))
            .collect()
    }
}

/// Greedy NMS; the survivors come back in descending score order.
fn nms(candidates: &mut [PoseCandidate], iou_thresh: f64) -> Vec<PoseCandidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<PoseCandidate> = Vec::new();
    for candidate in candidates.iter() {
        if keep
            .iter()
            .all(|kept| bbox_iou(&kept.bbox, &candidate.bbox) <= iou_thresh)
        {
            keep.push(candidate.clone());
        }
    }
    keep
}

fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    inter / (area_a + area_b - inter)
}
