//! SSD anchor centres for the MediaPipe palm detector.
//!
//! Four output layers over a 192px input with strides 8, 16, 16, 16 and two
//! fixed-size anchors per layer. Layers sharing a stride share one feature map,
//! so the 16px map carries six anchors per cell.

use super::super::common::PALM_INPUT_SIZE;

const STRIDES: [u32; 4] = [8, 16, 16, 16];
const ANCHORS_PER_LAYER: usize = 2;
const ANCHOR_OFFSET: f32 = 0.5;

pub const NUM_ANCHORS: usize = 2016;

pub fn generate_anchors() -> Vec<[f32; 2]> {
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);
    let mut layer = 0;
    while layer < STRIDES.len() {
        let stride = STRIDES[layer];
        let mut same_stride = 0;
        while layer < STRIDES.len() && STRIDES[layer] == stride {
            same_stride += 1;
            layer += 1;
        }

        let fm = PALM_INPUT_SIZE.div_ceil(stride);
        let per_cell = same_stride * ANCHORS_PER_LAYER;
        for y in 0..fm {
            let cy = (y as f32 + ANCHOR_OFFSET) / fm as f32;
            for x in 0..fm {
                let cx = (x as f32 + ANCHOR_OFFSET) / fm as f32;
                for _ in 0..per_cell {
                    anchors.push([cx, cy]);
                }
            }
        }
    }
    anchors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_count_matches_model_output() {
        let anchors = generate_anchors();
        assert_eq!(anchors.len(), NUM_ANCHORS);
    }

    #[test]
    fn first_and_last_cells() {
        let anchors = generate_anchors();
        assert_eq!(anchors[0], [0.5 / 24.0, 0.5 / 24.0]);
        assert_eq!(anchors[1], anchors[0]);
        // First anchor of the 12x12 map follows the 24x24x2 block.
        assert_eq!(anchors[24 * 24 * 2], [0.5 / 12.0, 0.5 / 12.0]);
        assert_eq!(anchors[NUM_ANCHORS - 1], [11.5 / 12.0, 11.5 / 12.0]);
    }
}
