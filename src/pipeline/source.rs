use std::path::Path;

use anyhow::{Context, Result, anyhow};
use image::{DynamicImage, ImageReader};

use super::FrameSource;
use crate::types::{ColorFrame, DepthFrame};

/// Live Kinect depth plus a color camera.
#[cfg(all(target_os = "linux", feature = "camera-nokhwa"))]
pub struct DeviceSource {
    depth: super::kinect::DepthStream,
    color: super::camera::ColorStream,
}

#[cfg(all(target_os = "linux", feature = "camera-nokhwa"))]
impl DeviceSource {
    pub fn open(
        depth_device: std::path::PathBuf,
        camera_index: u32,
        resolution: crate::config::Resolution,
    ) -> Result<Self> {
        let depth = super::kinect::start_depth_stream(depth_device, resolution)?;
        let color = super::camera::start_color_stream(
            nokhwa::utils::CameraIndex::Index(camera_index),
            resolution,
        )?;
        Ok(Self { depth, color })
    }
}

#[cfg(all(target_os = "linux", feature = "camera-nokhwa"))]
impl FrameSource for DeviceSource {
    fn acquire_depth(&mut self) -> Result<DepthFrame> {
        self.depth.recv_latest()
    }

    fn acquire_color(&mut self) -> Result<ColorFrame> {
        self.color.recv_latest()
    }
}

/// A recorded depth/color pair served on every acquisition.
#[derive(Clone, Debug)]
pub struct ReplaySource {
    depth: DepthFrame,
    color: ColorFrame,
}

impl ReplaySource {
    pub fn new(depth: DepthFrame, color: ColorFrame) -> Self {
        Self { depth, color }
    }

    pub fn open(depth_path: &Path, color_path: &Path) -> Result<Self> {
        let depth = load_depth_image(depth_path)?;
        let color = ImageReader::open(color_path)
            .with_context(|| format!("failed to open {}", color_path.display()))?
            .decode()
            .with_context(|| format!("failed to decode {}", color_path.display()))?
            .to_rgb8();
        log::info!(
            "replaying depth {} ({}x{}) with color {} ({}x{})",
            depth_path.display(),
            depth.width,
            depth.height,
            color_path.display(),
            color.width(),
            color.height()
        );
        Ok(Self::new(depth, ColorFrame::new(color)))
    }
}

impl FrameSource for ReplaySource {
    fn acquire_depth(&mut self) -> Result<DepthFrame> {
        Ok(self.depth.clone())
    }

    fn acquire_color(&mut self) -> Result<ColorFrame> {
        Ok(self.color.clone())
    }
}

/// Read raw depth from a single-channel 16-bit image; 8-bit images are taken as-is.
pub fn load_depth_image(path: &Path) -> Result<DepthFrame> {
    let img = ImageReader::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .decode()
        .with_context(|| format!("failed to decode {}", path.display()))?;
    depth_from_image(img).with_context(|| format!("{} is not a depth image", path.display()))
}

fn depth_from_image(img: DynamicImage) -> Result<DepthFrame> {
    let (width, height) = (img.width(), img.height());
    let depth = match img {
        DynamicImage::ImageLuma16(luma) => luma.into_raw(),
        DynamicImage::ImageLuma8(luma) => luma.into_raw().into_iter().map(u16::from).collect(),
        other => {
            return Err(anyhow!(
                "expected a grayscale image, got {:?}",
                other.color()
            ));
        }
    };
    Ok(DepthFrame::new(depth, width, height))
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Luma, RgbImage};

    use super::*;

    #[test]
    fn sixteen_bit_gray_keeps_raw_values() {
        let mut luma: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::new(4, 2);
        luma.put_pixel(3, 1, Luma([650]));
        let frame = depth_from_image(DynamicImage::ImageLuma16(luma)).unwrap();
        assert_eq!((frame.width, frame.height), (4, 2));
        assert_eq!(frame.get(3, 1), Some(650));
        assert_eq!(frame.get(0, 0), Some(0));
    }

    #[test]
    fn color_image_is_not_depth() {
        let err = depth_from_image(DynamicImage::ImageRgb8(RgbImage::new(2, 2)));
        assert!(err.is_err());
    }

    #[test]
    fn replay_repeats_frames() {
        let mut source = ReplaySource::new(
            DepthFrame::filled(8, 8, 640),
            ColorFrame::new(RgbImage::new(8, 8)),
        );
        for _ in 0..3 {
            assert_eq!(source.acquire_depth().unwrap().get(4, 4), Some(640));
            assert_eq!(source.acquire_color().unwrap().width(), 8);
        }
    }
}
