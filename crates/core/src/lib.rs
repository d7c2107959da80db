//! Bridges a playing video source and a frame-synchronous landmark
//! detector into an ordered, duplicate-free stream of [`FrameResult`]s.
//!
//! [`FrameResult`]: shared::frame_result::FrameResult

pub mod detection;
pub mod overlay;
pub mod pipeline;
pub mod recording;
pub mod shared;
pub mod state;
pub mod video;
