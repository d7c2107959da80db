pub mod constants;
pub mod frame;
pub mod frame_result;
pub mod landmark;
#[cfg(feature = "onnx")]
pub mod model_resolver;
pub mod settings;
