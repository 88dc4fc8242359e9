use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    HandDetectorConfig,
    common::{self, INPUT_SIZE},
    palm::{PalmDetector, PalmDetectorConfig, PalmRegion, crop_from_palm},
};
use crate::{
    pipeline::LandmarkDetector,
    types::{ColorFrame, HandSkeleton, Handedness},
};

struct Sessions {
    handpose: Session,
    palm_detector: PalmDetector,
}

/// MediaPipe palm detection followed by one handpose pass per palm.
pub struct OrtHandDetector {
    sessions: Option<Sessions>,
    cfg: HandDetectorConfig,
}

impl OrtHandDetector {
    pub fn new(
        model_path: &Path,
        palm_detector_model_path: &Path,
        cfg: HandDetectorConfig,
    ) -> Result<Self> {
        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        let palm_detector = PalmDetector::new(
            palm_detector_model_path,
            PalmDetectorConfig {
                score_threshold: cfg.min_detection_confidence,
                top_k: cfg.max_hands,
                ..PalmDetectorConfig::default()
            },
        )?;

        Ok(Self {
            sessions: Some(Sessions {
                handpose,
                palm_detector,
            }),
            cfg,
        })
    }
}

impl Sessions {
    fn estimate(&mut self, frame: &ColorFrame, palm: &PalmRegion) -> Result<HandSkeleton> {
        let (center, side, angle) = crop_from_palm(palm);
        let (input, transform) =
            common::prepare_rotated_crop(frame, center, side, angle, INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let landmarks = common::decode_landmarks(&flattened)?;

        let scalar_output = |idx: usize| -> f32 {
            if outputs.len() > idx {
                outputs[idx]
                    .try_extract_array::<f32>()
                    .ok()
                    .and_then(|arr| arr.iter().next().copied())
                    .unwrap_or(0.0)
            } else {
                0.0
            }
        };
        let confidence = scalar_output(1);
        let handedness = scalar_output(2);

        Ok(HandSkeleton {
            landmarks: transform.normalize(&landmarks),
            confidence: confidence.clamp(0.0, 1.0),
            handedness: Handedness::from_score(handedness),
        })
    }
}

impl LandmarkDetector for OrtHandDetector {
    fn process(&mut self, frame: &ColorFrame) -> Result<Vec<HandSkeleton>> {
        let sessions = self
            .sessions
            .as_mut()
            .ok_or_else(|| anyhow!("hand detector already closed"))?;

        let palms = sessions.palm_detector.detect(frame)?;
        let mut hands = Vec::with_capacity(palms.len());
        for palm in palms.iter().take(self.cfg.max_hands) {
            let hand = sessions.estimate(frame, palm)?;
            if hand.confidence < self.cfg.min_presence_confidence {
                log::trace!(
                    "dropping hand with confidence {:.2} (palm score {:.2})",
                    hand.confidence,
                    palm.score
                );
                continue;
            }
            hands.push(hand);
        }
        Ok(hands)
    }

    fn close(&mut self) {
        if self.sessions.take().is_some() {
            log::info!("hand detector sessions released");
        }
    }
}
