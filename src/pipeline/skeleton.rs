use image::{Rgb, RgbImage};

use crate::types::{HandSkeleton, Landmark, NUM_LANDMARKS};

/// MediaPipe hand topology as landmark index pairs.
pub const HAND_CONNECTIONS: &[(usize, usize)] = &[
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    (5, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    (9, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    (13, 17),
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
];

#[derive(Clone, Debug)]
pub struct SkeletonStyle {
    pub connection_color: Rgb<u8>,
    pub connection_thickness: i32,
    pub landmark_color: Rgb<u8>,
    pub landmark_radius: i32,
    pub outline_color: Rgb<u8>,
}

impl Default for SkeletonStyle {
    fn default() -> Self {
        Self {
            connection_color: Rgb([224, 224, 224]),
            connection_thickness: 2,
            landmark_color: Rgb([255, 0, 0]),
            landmark_radius: 2,
            outline_color: Rgb([255, 255, 255]),
        }
    }
}

/// Draw connections, then landmark dots. Landmarks outside the unit square are skipped.
pub fn draw_skeleton(canvas: &mut RgbImage, hand: &HandSkeleton, style: &SkeletonStyle) {
    let (width, height) = canvas.dimensions();
    let mut points: [Option<(i32, i32)>; NUM_LANDMARKS] = [None; NUM_LANDMARKS];
    for (slot, lm) in points.iter_mut().zip(hand.landmarks.iter()) {
        *slot = to_pixel(lm, width, height);
    }

    for &(a, b) in HAND_CONNECTIONS {
        if let (Some(Some(pa)), Some(Some(pb))) = (points.get(a), points.get(b)) {
            draw_line(
                canvas,
                *pa,
                *pb,
                style.connection_color,
                style.connection_thickness,
            );
        }
    }

    let outline_radius = style.landmark_radius + 1;
    for point in points.iter().flatten() {
        draw_circle(canvas, *point, outline_radius, style.outline_color);
        draw_circle(canvas, *point, style.landmark_radius, style.landmark_color);
    }
}

fn to_pixel(lm: &Landmark, width: u32, height: u32) -> Option<(i32, i32)> {
    let in_unit = |v: f32| (0.0..=1.0).contains(&v);
    if !in_unit(lm.x) || !in_unit(lm.y) {
        return None;
    }
    let px = (lm.x * width as f32).floor().min(width.saturating_sub(1) as f32);
    let py = (lm.y * height as f32).floor().min(height.saturating_sub(1) as f32);
    Some((px as i32, py as i32))
}

fn draw_line(canvas: &mut RgbImage, p0: (i32, i32), p1: (i32, i32), color: Rgb<u8>, thickness: i32) {
    let (mut x0, mut y0) = p0;
    let (x1, y1) = p1;
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let radius = (thickness.max(1) - 1) / 2;

    loop {
        put_pixel_safe(canvas, x0, y0, color);
        if radius > 0 {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if (ox != 0 || oy != 0) && ox.abs() + oy.abs() <= radius {
                        put_pixel_safe(canvas, x0 + ox, y0 + oy, color);
                    }
                }
            }
        } else if thickness > 1 {
            // Even thickness of 2: thicken by one pixel to the lower right.
            put_pixel_safe(canvas, x0 + 1, y0, color);
            put_pixel_safe(canvas, x0, y0 + 1, color);
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn draw_circle(canvas: &mut RgbImage, center: (i32, i32), radius: i32, color: Rgb<u8>) {
    let (cx, cy) = center;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put_pixel_safe(canvas, cx + dx, cy + dy, color);
            }
        }
    }
}

fn put_pixel_safe(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x < 0 || y < 0 {
        return;
    }
    let (ux, uy) = (x as u32, y as u32);
    if ux >= canvas.width() || uy >= canvas.height() {
        return;
    }
    canvas.put_pixel(ux, uy, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand_at(x: f32, y: f32) -> HandSkeleton {
        HandSkeleton::new([Landmark::new(x, y, 0.0); NUM_LANDMARKS])
    }

    #[test]
    fn topology_references_valid_landmarks() {
        assert_eq!(HAND_CONNECTIONS.len(), 21);
        for &(a, b) in HAND_CONNECTIONS {
            assert!(a < NUM_LANDMARKS && b < NUM_LANDMARKS);
            assert_ne!(a, b);
        }
    }

    #[test]
    fn draws_landmark_dot() {
        let mut canvas = RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]));
        draw_skeleton(&mut canvas, &hand_at(0.5, 0.5), &SkeletonStyle::default());
        assert_eq!(canvas.get_pixel(32, 24), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([255, 255, 255]));
    }

    #[test]
    fn skips_out_of_frame_landmarks() {
        let mut canvas = RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]));
        let before = canvas.clone();
        draw_skeleton(&mut canvas, &hand_at(1.2, -0.1), &SkeletonStyle::default());
        assert_eq!(canvas, before);
    }

    #[test]
    fn draws_connection_between_spread_points() {
        let mut landmarks = [Landmark::new(0.1, 0.5, 0.0); NUM_LANDMARKS];
        landmarks[1] = Landmark::new(0.9, 0.5, 0.0);
        let hand = HandSkeleton::new(landmarks);
        let mut canvas = RgbImage::from_pixel(100, 10, Rgb([255, 255, 255]));
        draw_skeleton(&mut canvas, &hand, &SkeletonStyle::default());
        // Midway along the wrist to thumb-cmc segment.
        assert_eq!(canvas.get_pixel(50, 5), &Rgb([224, 224, 224]));
    }
}
