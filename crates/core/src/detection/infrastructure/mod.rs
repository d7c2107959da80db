#[cfg(feature = "onnx")]
pub mod execution_provider;
#[cfg(feature = "onnx")]
pub mod onnx_pose_detector;
pub mod replay_detector;
