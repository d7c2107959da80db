/// Refresh rate used when no display refresh signal is available.
pub const DEFAULT_REFRESH_HZ: f64 = 60.0;

/// Scene extent used by the overlay, matching the 640x480 capture request.
pub const SCENE_WIDTH: f32 = 640.0;
pub const SCENE_HEIGHT: f32 = 480.0;

pub const POSE_MODEL_NAME: &str = "yolo11n-pose.onnx";

/// Loop ticks between periodic summaries in the CLI.
pub const DEFAULT_SUMMARY_EVERY: u64 = 300;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const SETTINGS_DIR_NAME: &str = "mocap";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
