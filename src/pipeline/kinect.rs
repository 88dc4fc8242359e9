//! Kinect depth capture through the kernel `gspca_kinect` V4L2 node.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use v4l::{Format, FourCC, buffer::Type, io::traits::CaptureStream as _, prelude::*, video::Capture};

use super::{
    capture::{CaptureStream, FrameSink, pump},
    depth::{unpack_y10b, unpack_y16},
};
use crate::{config::Resolution, types::DepthFrame};

const MMAP_BUFFERS: u32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DepthFormat {
    Y10B,
    Y16,
}

impl DepthFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"Y10B" => Some(DepthFormat::Y10B),
            b"Y16 " => Some(DepthFormat::Y16),
            _ => None,
        }
    }

    fn unpack(self, data: &[u8], width: u32, height: u32) -> Result<Vec<u16>> {
        match self {
            DepthFormat::Y10B => unpack_y10b(data, width, height),
            DepthFormat::Y16 => unpack_y16(data, width, height),
        }
    }
}

pub type DepthStream = CaptureStream<DepthFrame>;

fn open_device(path: &Path, resolution: Resolution) -> Result<(Device, DepthFormat)> {
    let dev = Device::with_path(path)
        .with_context(|| format!("failed to open depth device {}", path.display()))?;

    // The driver may substitute another fourcc instead of failing the request.
    let mut negotiated = None;
    for fourcc in [FourCC::new(b"Y10B"), FourCC::new(b"Y16 ")] {
        let requested = Format::new(resolution.width, resolution.height, fourcc);
        match dev.set_format(&requested) {
            Ok(applied) => {
                if let Some(depth_format) = DepthFormat::from_fourcc(applied.fourcc) {
                    negotiated = Some((applied, depth_format));
                    break;
                }
                log::warn!("requested {fourcc} but device chose {}", applied.fourcc);
            }
            Err(err) => log::warn!("device refused {fourcc}: {err}"),
        }
    }

    let (applied, depth_format) = negotiated
        .ok_or_else(|| anyhow!("{} offers no Y10B or Y16 depth format", path.display()))?;
    if applied.width != resolution.width || applied.height != resolution.height {
        return Err(anyhow!(
            "depth device negotiated {}x{}, expected {}x{}",
            applied.width,
            applied.height,
            resolution.width,
            resolution.height
        ));
    }

    Ok((dev, depth_format))
}

pub fn start_depth_stream(path: PathBuf, resolution: Resolution) -> Result<DepthStream> {
    let (dev, depth_format) = open_device(&path, resolution)?;
    log::info!(
        "depth device {} streaming {:?} at {}x{}",
        path.display(),
        depth_format,
        resolution.width,
        resolution.height
    );

    Ok(CaptureStream::spawn("depth", move |sink| {
        capture_loop(&dev, depth_format, resolution, &sink)
    }))
}

fn capture_loop(
    dev: &Device,
    depth_format: DepthFormat,
    resolution: Resolution,
    sink: &FrameSink<DepthFrame>,
) -> Result<()> {
    let mut stream = MmapStream::with_buffers(dev, Type::VideoCapture, MMAP_BUFFERS)
        .context("failed to create depth buffer stream")?;

    pump(sink, || {
        let (buf, _meta) = stream.next().context("failed to capture depth frame")?;
        match depth_format.unpack(buf, resolution.width, resolution.height) {
            Ok(depth) => Ok(Some(DepthFrame::new(
                depth,
                resolution.width,
                resolution.height,
            ))),
            Err(err) => {
                log::warn!("dropping depth frame: {err:?}");
                Ok(None)
            }
        }
    })
}
