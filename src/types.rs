use std::time::Instant;

use image::RgbImage;

pub const NUM_LANDMARKS: usize = 21;

/// Raw depth samples in sensor units, row-major.
#[derive(Clone, Debug)]
pub struct DepthFrame {
    pub depth: Vec<u16>,
    pub width: u32,
    pub height: u32,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl DepthFrame {
    pub fn new(depth: Vec<u16>, width: u32, height: u32) -> Self {
        Self {
            depth,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn filled(width: u32, height: u32, value: u16) -> Self {
        Self::new(vec![value; width as usize * height as usize], width, height)
    }

    pub fn get(&self, x: u32, y: u32) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.depth
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn set(&mut self, x: u32, y: u32, value: u16) {
        if x < self.width && y < self.height {
            let idx = y as usize * self.width as usize + x as usize;
            if let Some(px) = self.depth.get_mut(idx) {
                *px = value;
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub rgb: RgbImage,
    #[allow(dead_code)]
    pub timestamp: Instant,
}

impl ColorFrame {
    pub fn new(rgb: RgbImage) -> Self {
        Self {
            rgb,
            timestamp: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }
}

/// MediaPipe hand landmark indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist = 0,
    ThumbCmc = 1,
    ThumbMcp = 2,
    ThumbIp = 3,
    ThumbTip = 4,
    IndexFingerMcp = 5,
    IndexFingerPip = 6,
    IndexFingerDip = 7,
    IndexFingerTip = 8,
    MiddleFingerMcp = 9,
    MiddleFingerPip = 10,
    MiddleFingerDip = 11,
    MiddleFingerTip = 12,
    RingFingerMcp = 13,
    RingFingerPip = 14,
    RingFingerDip = 15,
    RingFingerTip = 16,
    PinkyMcp = 17,
    PinkyPip = 18,
    PinkyDip = 19,
    PinkyTip = 20,
}

impl HandLandmark {
    pub const ALL: [HandLandmark; NUM_LANDMARKS] = [
        HandLandmark::Wrist,
        HandLandmark::ThumbCmc,
        HandLandmark::ThumbMcp,
        HandLandmark::ThumbIp,
        HandLandmark::ThumbTip,
        HandLandmark::IndexFingerMcp,
        HandLandmark::IndexFingerPip,
        HandLandmark::IndexFingerDip,
        HandLandmark::IndexFingerTip,
        HandLandmark::MiddleFingerMcp,
        HandLandmark::MiddleFingerPip,
        HandLandmark::MiddleFingerDip,
        HandLandmark::MiddleFingerTip,
        HandLandmark::RingFingerMcp,
        HandLandmark::RingFingerPip,
        HandLandmark::RingFingerDip,
        HandLandmark::RingFingerTip,
        HandLandmark::PinkyMcp,
        HandLandmark::PinkyPip,
        HandLandmark::PinkyDip,
        HandLandmark::PinkyTip,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            HandLandmark::Wrist => "wrist",
            HandLandmark::ThumbCmc => "thumb-cmc",
            HandLandmark::ThumbMcp => "thumb-mcp",
            HandLandmark::ThumbIp => "thumb-ip",
            HandLandmark::ThumbTip => "thumb-tip",
            HandLandmark::IndexFingerMcp => "index-mcp",
            HandLandmark::IndexFingerPip => "index-pip",
            HandLandmark::IndexFingerDip => "index-dip",
            HandLandmark::IndexFingerTip => "index-tip",
            HandLandmark::MiddleFingerMcp => "middle-mcp",
            HandLandmark::MiddleFingerPip => "middle-pip",
            HandLandmark::MiddleFingerDip => "middle-dip",
            HandLandmark::MiddleFingerTip => "middle-tip",
            HandLandmark::RingFingerMcp => "ring-mcp",
            HandLandmark::RingFingerPip => "ring-pip",
            HandLandmark::RingFingerDip => "ring-dip",
            HandLandmark::RingFingerTip => "ring-tip",
            HandLandmark::PinkyMcp => "pinky-mcp",
            HandLandmark::PinkyPip => "pinky-pip",
            HandLandmark::PinkyDip => "pinky-dip",
            HandLandmark::PinkyTip => "pinky-tip",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let needle = name.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL.into_iter().find(|lm| lm.name() == needle)
    }
}

/// Normalized landmark position: x and y are fractions of the color frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.5 {
            Handedness::Right
        } else if score > 0.0 {
            Handedness::Left
        } else {
            Handedness::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
            Handedness::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HandSkeleton {
    pub landmarks: [Landmark; NUM_LANDMARKS],
    pub confidence: f32,
    pub handedness: Handedness,
}

impl HandSkeleton {
    pub fn new(landmarks: [Landmark; NUM_LANDMARKS]) -> Self {
        Self {
            landmarks,
            confidence: 1.0,
            handedness: Handedness::Unknown,
        }
    }

    pub fn landmark(&self, which: HandLandmark) -> Landmark {
        self.landmarks[which.index()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateOutcome {
    Accept,
    Reject,
}

impl GateOutcome {
    pub fn is_accept(self) -> bool {
        matches!(self, GateOutcome::Accept)
    }
}

/// The depth lookup a gate decision was made from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthSample {
    pub x: u32,
    pub y: u32,
    pub raw: u16,
    pub visual: u8,
}

#[derive(Clone, Debug)]
pub struct GateDecision {
    pub outcome: GateOutcome,
    pub hand: HandSkeleton,
    pub sample: DepthSample,
}
