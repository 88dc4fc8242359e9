use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("frame acquisition failed")]
    Acquisition(#[source] anyhow::Error),

    #[error("depth frame is {got_w}x{got_h}, expected {want_w}x{want_h}")]
    DepthResolution {
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },

    #[error("landmark detection failed")]
    Detector(#[source] anyhow::Error),

    #[error("failed to present frame")]
    Presenter(#[source] anyhow::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("depth band ({lower}, {upper}) holds no depth value; upper must exceed lower by at least 2")]
    EmptyDepthBand { lower: u16, upper: u16 },

    #[error("resolution must be non-zero, got {width}x{height}")]
    ZeroResolution { width: u32, height: u32 },

    #[error("translation ({dx}, {dy}) moves the whole {width}x{height} canvas out of view")]
    OffsetOutOfView {
        dx: i32,
        dy: i32,
        width: u32,
        height: u32,
    },

    #[error("unknown hand landmark `{0}`")]
    UnknownLandmark(String),
}
