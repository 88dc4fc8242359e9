#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod capture;
pub mod compositor;
pub mod depth;
pub mod display;
pub mod frame_loop;
pub mod gate;
#[cfg(target_os = "linux")]
pub mod kinect;
pub mod recognizer;
#[cfg(feature = "camera-nokhwa")]
pub mod rgb_converter;
pub mod skeleton;
pub mod source;

use std::time::Duration;

use anyhow::Result;
use image::RgbImage;

use crate::types::{ColorFrame, DepthFrame, HandSkeleton};

pub use frame_loop::run_frame_loop;

/// Paired depth and color capture. Both calls block until a frame is ready.
pub trait FrameSource {
    fn acquire_depth(&mut self) -> Result<DepthFrame>;
    fn acquire_color(&mut self) -> Result<ColorFrame>;
}

pub trait LandmarkDetector {
    /// Zero or more hands, in detection order.
    fn process(&mut self, frame: &ColorFrame) -> Result<Vec<HandSkeleton>>;
    fn close(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Escape,
    /// The display went away (window closed).
    Closed,
    Other,
}

pub trait Presenter {
    fn show(&mut self, canvas: &RgbImage) -> Result<()>;
    fn poll_key(&mut self, timeout: Duration) -> Option<Key>;
}
