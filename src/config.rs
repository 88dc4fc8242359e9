use crate::{
    error::ConfigError,
    pipeline::skeleton::SkeletonStyle,
    types::HandLandmark,
};

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;

/// Raw depth values strictly between `lower` and `upper` count as a touch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthBand {
    pub lower: u16,
    pub upper: u16,
}

impl DepthBand {
    pub fn new(lower: u16, upper: u16) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, depth: u16) -> bool {
        depth > self.lower && depth < self.upper
    }
}

impl Default for DepthBand {
    fn default() -> Self {
        Self {
            lower: 630,
            upper: 670,
        }
    }
}

/// Canvas shift applied after compositing, in pixels (right and down are positive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Offset {
    pub dx: i32,
    pub dy: i32,
}

impl Default for Offset {
    fn default() -> Self {
        Self { dx: 20, dy: 110 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DetectorFailurePolicy {
    /// Log and render the frame as if no hand had been seen.
    #[default]
    Skip,
    /// Stop the loop and return the detector error.
    Abort,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub depth_band: DepthBand,
    pub offset: Offset,
    pub resolution: Resolution,
    pub control_landmark: HandLandmark,
    pub style: SkeletonStyle,
    pub on_detector_error: DetectorFailurePolicy,
    pub max_frames: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            depth_band: DepthBand::default(),
            offset: Offset::default(),
            resolution: Resolution::default(),
            control_landmark: HandLandmark::IndexFingerTip,
            style: SkeletonStyle::default(),
            on_detector_error: DetectorFailurePolicy::default(),
            max_frames: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let DepthBand { lower, upper } = self.depth_band;
        // Both bounds are exclusive, so the band needs at least one value between them.
        if upper <= lower.saturating_add(1) {
            return Err(ConfigError::EmptyDepthBand { lower, upper });
        }

        let Resolution { width, height } = self.resolution;
        if width == 0 || height == 0 {
            return Err(ConfigError::ZeroResolution { width, height });
        }

        let Offset { dx, dy } = self.offset;
        if dx.unsigned_abs() >= width || dy.unsigned_abs() >= height {
            return Err(ConfigError::OffsetOutOfView {
                dx,
                dy,
                width,
                height,
            });
        }

        Ok(())
    }
}

pub fn parse_landmark(name: &str) -> Result<HandLandmark, ConfigError> {
    if let Ok(index) = name.trim().parse::<usize>() {
        if let Some(lm) = HandLandmark::ALL.get(index) {
            return Ok(*lm);
        }
    }
    HandLandmark::from_name(name).ok_or_else(|| ConfigError::UnknownLandmark(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_is_open_interval() {
        let band = DepthBand::default();
        assert!(!band.contains(630));
        assert!(band.contains(631));
        assert!(band.contains(650));
        assert!(band.contains(669));
        assert!(!band.contains(670));
        assert!(!band.contains(0));
        assert!(!band.contains(1023));
    }

    #[test]
    fn defaults_validate() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.offset, Offset { dx: 20, dy: 110 });
        assert_eq!(cfg.resolution, Resolution { width: 640, height: 480 });
        assert_eq!(cfg.control_landmark, HandLandmark::IndexFingerTip);
    }

    #[test]
    fn rejects_empty_band() {
        let cfg = PipelineConfig {
            depth_band: DepthBand::new(670, 670),
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::EmptyDepthBand {
                lower: 670,
                upper: 670
            })
        );
    }

    #[test]
    fn rejects_band_without_interior_values() {
        for (lower, upper) in [(630, 631), (700, 630), (u16::MAX, u16::MAX)] {
            let cfg = PipelineConfig {
                depth_band: DepthBand::new(lower, upper),
                ..Default::default()
            };
            assert_eq!(
                cfg.validate(),
                Err(ConfigError::EmptyDepthBand { lower, upper })
            );
        }

        let narrowest = PipelineConfig {
            depth_band: DepthBand::new(630, 632),
            ..Default::default()
        };
        assert_eq!(narrowest.validate(), Ok(()));
        assert!(narrowest.depth_band.contains(631));
    }

    #[test]
    fn rejects_offset_past_canvas() {
        let cfg = PipelineConfig {
            offset: Offset { dx: -640, dy: 0 },
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OffsetOutOfView { .. })
        ));
    }

    #[test]
    fn landmark_by_name_or_index() {
        assert_eq!(parse_landmark("index-tip"), Ok(HandLandmark::IndexFingerTip));
        assert_eq!(parse_landmark("THUMB_TIP"), Ok(HandLandmark::ThumbTip));
        assert_eq!(parse_landmark("12"), Ok(HandLandmark::MiddleFingerTip));
        assert_eq!(
            parse_landmark("21"),
            Err(ConfigError::UnknownLandmark("21".into()))
        );
    }
}
