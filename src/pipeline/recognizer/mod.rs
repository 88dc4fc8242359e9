mod common;
mod ort;
mod palm;

use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::model_download::{
    default_handpose_estimator_model_path, default_palm_detector_model_path,
    ensure_handpose_estimator_model_ready, ensure_palm_detector_model_ready,
};

pub use self::ort::OrtHandDetector;

#[derive(Clone, Debug)]
pub struct RecognizerBackend {
    handpose_estimator_model_path: PathBuf,
    palm_detector_model_path: PathBuf,
}

impl RecognizerBackend {
    pub fn new(handpose_estimator_model_path: PathBuf, palm_detector_model_path: PathBuf) -> Self {
        Self {
            handpose_estimator_model_path,
            palm_detector_model_path,
        }
    }

    pub fn handpose_estimator_model_path(&self) -> PathBuf {
        self.handpose_estimator_model_path.clone()
    }

    pub fn palm_detector_model_path(&self) -> PathBuf {
        self.palm_detector_model_path.clone()
    }

    pub fn label(&self) -> &'static str {
        "ort"
    }
}

impl Default for RecognizerBackend {
    fn default() -> Self {
        Self {
            handpose_estimator_model_path: default_handpose_estimator_model_path(),
            palm_detector_model_path: default_palm_detector_model_path(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HandDetectorConfig {
    /// Palm detector score needed to look for a hand at all.
    pub min_detection_confidence: f32,
    /// Handpose confidence needed to report the landmarks.
    pub min_presence_confidence: f32,
    pub max_hands: usize,
}

impl Default for HandDetectorConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.3,
            min_presence_confidence: 0.5,
            max_hands: 2,
        }
    }
}

/// Fetch the models if needed and open both ORT sessions.
pub fn load_detector(
    backend: &RecognizerBackend,
    cfg: HandDetectorConfig,
) -> Result<OrtHandDetector> {
    log::info!("starting handpose backend: {}", backend.label());

    let handpose_path = backend.handpose_estimator_model_path();
    let palm_path = backend.palm_detector_model_path();

    ensure_handpose_estimator_model_ready(&handpose_path).with_context(|| {
        format!(
            "failed to prepare handpose model at {}",
            handpose_path.display()
        )
    })?;
    ensure_palm_detector_model_ready(&palm_path).with_context(|| {
        format!(
            "failed to prepare palm detector model at {}",
            palm_path.display()
        )
    })?;

    let detector = OrtHandDetector::new(&handpose_path, &palm_path, cfg)?;
    log::info!(
        "handpose ORT backend ready using {} and palm detector {}",
        handpose_path.display(),
        palm_path.display()
    );
    Ok(detector)
}
