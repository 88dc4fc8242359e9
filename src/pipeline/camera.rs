use std::time::Instant;

use anyhow::{Context, Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution as CameraResolution,
    },
};

use super::{
    capture::{CaptureStream, FrameSink, pump},
    rgb_converter,
};
use crate::{config::Resolution, types::ColorFrame};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

fn requested_formats(resolution: Resolution) -> [RequestedFormat<'static>; 4] {
    let wanted = CameraFormat::new(
        CameraResolution::new(resolution.width, resolution.height),
        FrameFormat::MJPEG,
        30,
    );
    [
        RequestedFormat::with_formats(RequestedFormatType::Closest(wanted), PREFERRED_PIXEL_FORMATS),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        // Fall back to any format Nokhwa can decode, but prefer higher FPS to
        // avoid very low default rates (e.g. 15 FPS) that some drivers reject.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub type ColorStream = CaptureStream<ColorFrame>;

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    format!("{} ({})", info.human_name(), info.description())
}

fn build_camera(index: CameraIndex, resolution: Resolution) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(resolution) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

pub fn start_color_stream(index: CameraIndex, resolution: Resolution) -> Result<ColorStream> {
    // Open once on the caller's thread so a missing camera fails fast.
    let opened_camera = build_camera(index.clone(), resolution)?;
    let opened = opened_camera.resolution();
    log::info!(
        "color camera {:?} opened at {}x{}",
        index,
        opened.width_x,
        opened.height_y
    );
    drop(opened_camera);

    Ok(CaptureStream::spawn("color", move |sink| {
        let mut camera = build_camera(index, resolution)?;
        capture_loop(&mut camera, &sink)
    }))
}

fn capture_loop(camera: &mut Camera, sink: &FrameSink<ColorFrame>) -> Result<()> {
    pump(sink, || {
        let frame_start = Instant::now();
        let frame = camera.frame().with_context(|| {
            format!("camera frame read failed after {:?}", frame_start.elapsed())
        })?;

        match rgb_converter::convert_camera_frame(&frame) {
            Ok(rgb) => Ok(Some(ColorFrame::new(rgb))),
            Err(err) => {
                log::warn!("failed to decode camera frame {err:?}");
                Ok(None)
            }
        }
    })
}
