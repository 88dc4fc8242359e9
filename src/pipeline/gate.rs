use crate::{
    config::DepthBand,
    pipeline::depth::normalize_sample,
    types::{DepthFrame, DepthSample, GateDecision, GateOutcome, HandLandmark, HandSkeleton, Landmark},
};

/// Map a normalized landmark onto the depth grid.
///
/// Rounds half to even and clamps into the frame, so edge artifacts from the
/// detector land on the border pixel instead of failing.
pub fn depth_pixel(landmark: &Landmark, width: u32, height: u32) -> (u32, u32) {
    let axis = |v: f32, extent: u32| -> u32 {
        let max = extent.saturating_sub(1) as f32;
        let scaled = (v * extent as f32).round_ties_even();
        if scaled.is_nan() {
            return 0;
        }
        scaled.clamp(0.0, max) as u32
    };
    (axis(landmark.x, width), axis(landmark.y, height))
}

pub fn sample_depth(frame: &DepthFrame, landmark: &Landmark) -> DepthSample {
    let (x, y) = depth_pixel(landmark, frame.width, frame.height);
    let raw = frame.get(x, y).unwrap_or(0);
    DepthSample {
        x,
        y,
        raw,
        visual: normalize_sample(raw),
    }
}

pub fn evaluate_hand(
    hand: &HandSkeleton,
    depth: &DepthFrame,
    control: HandLandmark,
    band: DepthBand,
) -> GateDecision {
    let sample = sample_depth(depth, &hand.landmark(control));
    let outcome = if band.contains(sample.raw) {
        GateOutcome::Accept
    } else {
        GateOutcome::Reject
    };
    log::debug!(
        "{} hand {} at ({}, {}) depth {} -> {:?}",
        hand.handedness.label(),
        control.name(),
        sample.x,
        sample.y,
        sample.raw,
        outcome
    );
    GateDecision {
        outcome,
        hand: hand.clone(),
        sample,
    }
}

/// One decision per hand, in detection order.
pub fn evaluate_hands(
    hands: &[HandSkeleton],
    depth: &DepthFrame,
    control: HandLandmark,
    band: DepthBand,
) -> Vec<GateDecision> {
    hands
        .iter()
        .map(|hand| evaluate_hand(hand, depth, control, band))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUM_LANDMARKS;

    fn hand_with_tip(x: f32, y: f32) -> HandSkeleton {
        let mut landmarks = [Landmark::new(0.2, 0.2, 0.0); NUM_LANDMARKS];
        landmarks[HandLandmark::IndexFingerTip.index()] = Landmark::new(x, y, 0.0);
        HandSkeleton::new(landmarks)
    }

    fn gate_at(depth_value: u16) -> GateOutcome {
        let mut depth = DepthFrame::filled(640, 480, 0);
        depth.set(320, 240, depth_value);
        evaluate_hand(
            &hand_with_tip(0.5, 0.5),
            &depth,
            HandLandmark::IndexFingerTip,
            DepthBand::default(),
        )
        .outcome
    }

    #[test]
    fn centre_maps_to_centre_pixel() {
        assert_eq!(depth_pixel(&Landmark::new(0.5, 0.5, 0.0), 640, 480), (320, 240));
    }

    #[test]
    fn band_edges_are_exclusive() {
        assert_eq!(gate_at(630), GateOutcome::Reject);
        assert_eq!(gate_at(631), GateOutcome::Accept);
        assert_eq!(gate_at(650), GateOutcome::Accept);
        assert_eq!(gate_at(669), GateOutcome::Accept);
        assert_eq!(gate_at(670), GateOutcome::Reject);
        assert_eq!(gate_at(700), GateOutcome::Reject);
    }

    #[test]
    fn clamps_out_of_frame_coordinates() {
        assert_eq!(depth_pixel(&Landmark::new(1.0, 1.0, 0.0), 640, 480), (639, 479));
        assert_eq!(depth_pixel(&Landmark::new(-0.3, 1.7, 0.0), 640, 480), (0, 479));
        assert_eq!(depth_pixel(&Landmark::new(f32::NAN, 0.0, 0.0), 640, 480), (0, 0));
    }

    #[test]
    fn rounds_half_to_even() {
        // 0.1875 * 8 = 1.5, 0.3125 * 8 = 2.5
        assert_eq!(depth_pixel(&Landmark::new(0.1875, 0.0, 0.0), 8, 8).0, 2);
        assert_eq!(depth_pixel(&Landmark::new(0.3125, 0.0, 0.0), 8, 8).0, 2);
    }

    #[test]
    fn edge_sample_reads_border_pixel() {
        let mut depth = DepthFrame::filled(640, 480, 0);
        depth.set(639, 0, 650);
        let decision = evaluate_hand(
            &hand_with_tip(1.0, 0.0),
            &depth,
            HandLandmark::IndexFingerTip,
            DepthBand::default(),
        );
        assert_eq!(decision.outcome, GateOutcome::Accept);
        assert_eq!((decision.sample.x, decision.sample.y), (639, 0));
        assert_eq!(decision.sample.visual, 162);
    }

    #[test]
    fn honours_control_landmark_and_band() {
        let mut landmarks = [Landmark::new(0.0, 0.0, 0.0); NUM_LANDMARKS];
        landmarks[HandLandmark::ThumbTip.index()] = Landmark::new(0.25, 0.25, 0.0);
        let hand = HandSkeleton::new(landmarks);
        let mut depth = DepthFrame::filled(640, 480, 0);
        depth.set(160, 120, 900);

        let band = DepthBand::new(800, 1000);
        let decisions = evaluate_hands(&[hand.clone()], &depth, HandLandmark::ThumbTip, band);
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].outcome, GateOutcome::Accept);

        let tip = evaluate_hand(&hand, &depth, HandLandmark::IndexFingerTip, band);
        assert_eq!(tip.outcome, GateOutcome::Reject);
    }
}
