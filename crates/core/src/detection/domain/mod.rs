pub mod holistic_detection;
pub mod landmark_detector;
