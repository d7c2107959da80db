use std::time::Duration;

use thiserror::Error;

use crate::shared::frame::Frame;

/// Errors raised while acquiring a source. Frame reads after acquisition
/// use the boxed error of [`VideoSource::current_frame`].
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("capture device {device} unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("source has been released")]
    Released,
}

/// Playback state of a source at the moment it is polled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SourceReadiness {
    pub playing: bool,
    pub ended: bool,
    pub has_enough_data: bool,
}

impl SourceReadiness {
    pub fn ready() -> Self {
        Self {
            playing: true,
            ended: false,
            has_enough_data: true,
        }
    }

    pub fn ended() -> Self {
        Self {
            playing: false,
            ended: true,
            has_enough_data: false,
        }
    }

    /// A frame may only be read when playing, not ended, and buffered.
    pub fn is_ready(&self) -> bool {
        self.playing && !self.ended && self.has_enough_data
    }
}

/// A continuously playing supply of frames.
///
/// `current_timestamp` is monotonic while playing; the same value is
/// reported for as long as the same frame is on display.
pub trait VideoSource: Send {
    /// Polls playback state. Pull-based sources advance their clock here.
    fn readiness(&mut self) -> SourceReadiness;

    fn current_timestamp(&self) -> Duration;

    /// The frame currently on display, tagged with `current_timestamp`.
    fn current_frame(&mut self) -> Result<Frame, Box<dyn std::error::Error>>;

    /// Frees any capture device or decoder. Idempotent; a released source
    /// reports ended.
    fn release(&mut self);
}
