use image::{GrayImage, Rgb, RgbImage};

use super::skeleton::{SkeletonStyle, draw_skeleton};
use crate::{
    config::Offset,
    types::{GateDecision, GateOutcome},
};

pub const CANVAS_WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const CANVAS_BLACK: Rgb<u8> = Rgb([0, 0, 0]);
/// Fill for the region a translation exposes.
pub const BACKGROUND: Rgb<u8> = CANVAS_BLACK;

/// White canvas sized from the depth visualization. Its pixels are not kept.
pub fn blank_canvas(visual: &GrayImage) -> RgbImage {
    let (width, height) = visual.dimensions();
    RgbImage::from_pixel(width, height, CANVAS_WHITE)
}

/// Apply gate decisions in order. An accepted hand is drawn, a rejected one
/// blacks out the whole canvas including hands drawn before it. Hands accepted
/// after the last reject are drawn on the black canvas.
pub fn composite(
    mut canvas: RgbImage,
    decisions: &[GateDecision],
    style: &SkeletonStyle,
) -> RgbImage {
    for decision in decisions {
        match decision.outcome {
            GateOutcome::Accept => draw_skeleton(&mut canvas, &decision.hand, style),
            GateOutcome::Reject => fill(&mut canvas, CANVAS_BLACK),
        }
    }
    canvas
}

pub fn fill(canvas: &mut RgbImage, color: Rgb<u8>) {
    for px in canvas.pixels_mut() {
        *px = color;
    }
}

/// Shift the canvas by `offset`, keeping its size. Pixels pushed past the edge
/// are dropped and the exposed strip takes `background`.
pub fn translate(canvas: &RgbImage, offset: Offset, background: Rgb<u8>) -> RgbImage {
    let (width, height) = canvas.dimensions();
    let mut out = RgbImage::from_pixel(width, height, background);
    let (w, h) = (width as i64, height as i64);
    let (dx, dy) = (offset.dx as i64, offset.dy as i64);

    let dst_x0 = dx.clamp(0, w);
    let dst_x1 = (w + dx).clamp(0, w);
    if dst_x1 <= dst_x0 {
        return out;
    }
    let span = ((dst_x1 - dst_x0) * 3) as usize;
    let src_x0 = dst_x0 - dx;
    let stride = width as usize * 3;

    let src = canvas.as_raw();
    let dst: &mut [u8] = &mut out;
    for dst_y in dy.clamp(0, h)..(h + dy).clamp(0, h) {
        let src_y = dst_y - dy;
        let s = src_y as usize * stride + src_x0 as usize * 3;
        let d = dst_y as usize * stride + dst_x0 as usize * 3;
        dst[d..d + span].copy_from_slice(&src[s..s + span]);
    }
    out
}
