use anyhow::{Result, anyhow};
use image::GrayImage;
use rayon::prelude::*;

use crate::types::DepthFrame;

/// Largest raw value the 10-bit visualization keeps; anything above saturates.
pub const MAX_RAW_DEPTH: u16 = (1 << 10) - 1;

pub fn normalize_sample(raw: u16) -> u8 {
    (raw.min(MAX_RAW_DEPTH) >> 2) as u8
}

/// Clamp to 10 bits and drop the two low bits, giving an 8-bit preview.
pub fn normalize_depth(frame: &DepthFrame) -> GrayImage {
    let mut out = GrayImage::new(frame.width, frame.height);
    let width = frame.width as usize;
    if width == 0 {
        return out;
    }
    out.par_chunks_mut(width)
        .zip(frame.depth.par_chunks(width))
        .for_each(|(dst, src)| {
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = normalize_sample(s);
            }
        });
    out
}

pub fn y10b_packed_size(width: u32, height: u32) -> usize {
    (width as usize * height as usize * 10).div_ceil(8)
}

/// Unpack V4L2 `Y10B`: 10-bit samples packed MSB first, four pixels in five bytes.
pub fn unpack_y10b(data: &[u8], width: u32, height: u32) -> Result<Vec<u16>> {
    let pixels = width as usize * height as usize;
    let expected = y10b_packed_size(width, height);
    if data.len() < expected {
        return Err(anyhow!(
            "Y10B buffer too small: got {}, expected {}",
            data.len(),
            expected
        ));
    }

    let mut out = Vec::with_capacity(pixels);
    for group in data[..expected].chunks(5) {
        let b = |i: usize| group.get(i).copied().unwrap_or(0) as u16;
        let unpacked = [
            (b(0) << 2) | (b(1) >> 6),
            ((b(1) & 0x3f) << 4) | (b(2) >> 4),
            ((b(2) & 0x0f) << 6) | (b(3) >> 2),
            ((b(3) & 0x03) << 8) | b(4),
        ];
        let remaining = pixels - out.len();
        out.extend_from_slice(&unpacked[..remaining.min(4)]);
    }
    Ok(out)
}

/// Unpack V4L2 `Y16 `: little-endian 16-bit samples (the Kinect puts 11-bit depth here).
pub fn unpack_y16(data: &[u8], width: u32, height: u32) -> Result<Vec<u16>> {
    let pixels = width as usize * height as usize;
    if data.len() < pixels * 2 {
        return Err(anyhow!(
            "Y16 buffer too small: got {}, expected {}",
            data.len(),
            pixels * 2
        ));
    }
    Ok(data
        .par_chunks_exact(2)
        .take(pixels)
        .map(|px| u16::from_le_bytes([px[0], px[1]]))
        .collect())
}
