#[cfg(feature = "camera")]
pub mod camera_source;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg_file_source;
pub mod still_image_source;
