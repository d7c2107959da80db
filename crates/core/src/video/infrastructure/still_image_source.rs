use std::path::Path;
use std::time::Duration;

use crate::shared::frame::Frame;
use crate::video::domain::video_source::{SourceError, SourceReadiness, VideoSource};

/// Presents a single image file as a video that never advances.
///
/// The timestamp stays at zero, so the loop detects the image once and
/// treats every later tick as a repeated frame.
pub struct StillImageSource {
    frame: Option<Frame>,
}

impl StillImageSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let img = image::open(path).map_err(|e| SourceError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self::from_frame(Frame::new(
            rgb.into_raw(),
            width,
            height,
            3,
            Duration::ZERO,
        )))
    }

    pub fn from_frame(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }
}

impl VideoSource for StillImageSource {
    fn readiness(&mut self) -> SourceReadiness {
        if self.frame.is_some() {
            SourceReadiness::ready()
        } else {
            SourceReadiness::ended()
        }
    }

    fn current_timestamp(&self) -> Duration {
        self.frame
            .as_ref()
            .map(Frame::timestamp)
            .unwrap_or_default()
    }

    fn current_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>> {
        self.frame.clone().ok_or_else(|| SourceError::Released.into())
    }

    fn release(&mut self) {
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write_test_image(dir: &Path, width: u32, height: u32) -> PathBuf {
        let path = dir.join("test.png");
        let mut img = image::RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgb([50, 100, 200]);
        }
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_open_decodes_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 10, 8);
        let mut source = StillImageSource::open(&path).unwrap();

        assert!(source.readiness().is_ready());
        let frame = source.current_frame().unwrap();
        assert_eq!(frame.width(), 10);
        assert_eq!(frame.height(), 8);
        assert_eq!(frame.channels(), 3);
        assert_eq!(&frame.data()[..3], &[50, 100, 200]);
    }

    #[test]
    fn test_timestamp_never_advances() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_test_image(dir.path(), 4, 4);
        let mut source = StillImageSource::open(&path).unwrap();

        let first = source.current_timestamp();
        source.current_frame().unwrap();
        assert_eq!(source.current_timestamp(), first);
    }

    #[test]
    fn test_open_nonexistent_errors() {
        let result = StillImageSource::open(Path::new("/nonexistent/test.png"));
        assert!(matches!(result, Err(SourceError::Open { .. })));
    }

    #[test]
    fn test_release_is_idempotent_and_ends_playback() {
        let frame = Frame::new(vec![0u8; 3], 1, 1, 3, Duration::ZERO);
        let mut source = StillImageSource::from_frame(frame);
        source.release();
        source.release();
        assert!(source.readiness().ended);
        assert!(source.current_frame().is_err());
    }
}
