mod config;
mod error;
mod model_download;
mod pipeline;
mod types;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};

use config::{
    DEFAULT_HEIGHT, DEFAULT_WIDTH, DepthBand, DetectorFailurePolicy, Offset, PipelineConfig,
    Resolution, parse_landmark,
};
use pipeline::{
    display::PngPresenter,
    recognizer::{HandDetectorConfig, RecognizerBackend, load_detector},
    run_frame_loop,
    source::ReplaySource,
};
use types::HandLandmark;

#[derive(Parser)]
#[command(name = "depth-touch")]
#[command(about = "Draw a hand skeleton only while the fingertip touches the depth band")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run against a live Kinect depth node and a color camera
    Run {
        /// V4L2 node exposing the Kinect depth stream
        #[arg(long, default_value = "/dev/video1")]
        depth_device: PathBuf,

        /// Color camera index (from 'depth-touch list')
        #[arg(short, long, default_value = "0")]
        camera: u32,

        /// Stretch the window over the screen and keep it on top
        #[arg(long)]
        fullscreen: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Replay a recorded depth/color pair and write the last canvas to a PNG
    Replay {
        /// 16-bit grayscale PNG with raw depth values
        #[arg(long)]
        depth: PathBuf,

        /// Color image the landmarks are detected on
        #[arg(long)]
        color: PathBuf,

        #[arg(short, long, default_value = "touch.png")]
        output: PathBuf,

        /// Number of passes over the recorded pair
        #[arg(long, default_value = "1")]
        frames: u64,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// List available color cameras
    List,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OnDetectorError {
    Skip,
    Abort,
}

impl From<OnDetectorError> for DetectorFailurePolicy {
    fn from(value: OnDetectorError) -> Self {
        match value {
            OnDetectorError::Skip => DetectorFailurePolicy::Skip,
            OnDetectorError::Abort => DetectorFailurePolicy::Abort,
        }
    }
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// Raw depth must be strictly above this to count as a touch
    #[arg(long, default_value = "630")]
    band_lower: u16,

    /// Raw depth must be strictly below this to count as a touch
    #[arg(long, default_value = "670")]
    band_upper: u16,

    #[arg(long, default_value = "20", allow_negative_numbers = true)]
    offset_x: i32,

    #[arg(long, default_value = "110", allow_negative_numbers = true)]
    offset_y: i32,

    #[arg(long, default_value_t = DEFAULT_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = DEFAULT_HEIGHT)]
    height: u32,

    /// Landmark whose depth gates the hand, by name or index
    #[arg(long, default_value = "index-tip", value_parser = parse_landmark)]
    landmark: HandLandmark,

    #[arg(long, value_enum, default_value = "skip")]
    on_detector_error: OnDetectorError,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    #[arg(long)]
    handpose_model: Option<PathBuf>,

    #[arg(long)]
    palm_model: Option<PathBuf>,

    #[arg(long, default_value = "0.3")]
    min_detection_confidence: f32,

    #[arg(long, default_value = "0.5")]
    min_presence_confidence: f32,

    #[arg(long, default_value = "2")]
    max_hands: usize,
}

impl PipelineArgs {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let cfg = PipelineConfig {
            depth_band: DepthBand::new(self.band_lower, self.band_upper),
            offset: Offset {
                dx: self.offset_x,
                dy: self.offset_y,
            },
            resolution: Resolution {
                width: self.width,
                height: self.height,
            },
            control_landmark: self.landmark,
            on_detector_error: self.on_detector_error.into(),
            max_frames: self.max_frames,
            ..PipelineConfig::default()
        };
        cfg.validate().context("invalid pipeline configuration")?;
        Ok(cfg)
    }

    fn backend(&self) -> RecognizerBackend {
        let defaults = RecognizerBackend::default();
        RecognizerBackend::new(
            self.handpose_model
                .clone()
                .unwrap_or_else(|| defaults.handpose_estimator_model_path()),
            self.palm_model
                .clone()
                .unwrap_or_else(|| defaults.palm_detector_model_path()),
        )
    }

    fn detector_config(&self) -> HandDetectorConfig {
        HandDetectorConfig {
            min_detection_confidence: self.min_detection_confidence,
            min_presence_confidence: self.min_presence_confidence,
            max_hands: self.max_hands,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            depth_device,
            camera,
            fullscreen,
            pipeline,
        } => run_live(depth_device, camera, fullscreen, &pipeline),
        Commands::Replay {
            depth,
            color,
            output,
            frames,
            pipeline,
        } => run_replay(depth, color, output, frames, &pipeline),
        Commands::List => list_cameras(),
    }
}

#[cfg(all(target_os = "linux", feature = "camera-nokhwa"))]
fn run_live(
    depth_device: PathBuf,
    camera: u32,
    fullscreen: bool,
    args: &PipelineArgs,
) -> Result<()> {
    use pipeline::{display::WindowPresenter, source::DeviceSource};

    let cfg = args.pipeline_config()?;
    let detector = load_detector(&args.backend(), args.detector_config())?;
    let mut source = DeviceSource::open(depth_device, camera, cfg.resolution)?;
    let mut presenter =
        WindowPresenter::new(cfg.resolution.width, cfg.resolution.height, fullscreen)?;

    run_frame_loop(&mut source, detector, &mut presenter, &cfg)?;
    Ok(())
}

#[cfg(not(all(target_os = "linux", feature = "camera-nokhwa")))]
fn run_live(
    _depth_device: PathBuf,
    _camera: u32,
    _fullscreen: bool,
    _args: &PipelineArgs,
) -> Result<()> {
    anyhow::bail!("live capture needs Linux and the `camera-nokhwa` feature; use `replay` instead")
}

fn run_replay(
    depth: PathBuf,
    color: PathBuf,
    output: PathBuf,
    frames: u64,
    args: &PipelineArgs,
) -> Result<()> {
    let mut cfg = args.pipeline_config()?;
    cfg.max_frames = Some(cfg.max_frames.map_or(frames, |limit| limit.min(frames)).max(1));

    let mut source = ReplaySource::open(&depth, &color)?;
    let detector = load_detector(&args.backend(), args.detector_config())?;
    let mut presenter = PngPresenter::new(output);

    let summary = run_frame_loop(&mut source, detector, &mut presenter, &cfg)?;
    presenter.save()?;
    println!(
        "{} frames: {} accepted, {} rejected, {} without hands -> {}",
        summary.frames,
        summary.accepted,
        summary.rejected,
        summary.empty,
        presenter.path().display()
    );
    Ok(())
}

#[cfg(feature = "camera-nokhwa")]
fn list_cameras() -> Result<()> {
    let cameras = pipeline::camera::available_cameras()?;
    if cameras.is_empty() {
        println!("no cameras found");
    }
    for camera in cameras {
        println!("{:?}: {}", camera.index, camera.label);
    }
    Ok(())
}

#[cfg(not(feature = "camera-nokhwa"))]
fn list_cameras() -> Result<()> {
    anyhow::bail!("camera listing needs the `camera-nokhwa` feature")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_flags_build_config() {
        let cli = Cli::try_parse_from([
            "depth-touch",
            "replay",
            "--depth",
            "d.png",
            "--color",
            "c.png",
            "--band-lower",
            "500",
            "--band-upper",
            "700",
            "--offset-x",
            "-5",
            "--landmark",
            "thumb-tip",
            "--on-detector-error",
            "abort",
        ])
        .unwrap();
        let Commands::Replay {
            pipeline, frames, ..
        } = cli.command
        else {
            panic!("expected replay");
        };
        assert_eq!(frames, 1);

        let cfg = pipeline.pipeline_config().unwrap();
        assert_eq!(cfg.depth_band, DepthBand::new(500, 700));
        assert_eq!(cfg.offset, Offset { dx: -5, dy: 110 });
        assert_eq!(cfg.control_landmark, HandLandmark::ThumbTip);
        assert_eq!(cfg.on_detector_error, DetectorFailurePolicy::Abort);
    }

    #[test]
    fn empty_band_is_rejected() {
        let cli = Cli::try_parse_from([
            "depth-touch",
            "run",
            "--band-lower",
            "670",
            "--band-upper",
            "630",
        ])
        .unwrap();
        let Commands::Run {
            pipeline,
            fullscreen,
            ..
        } = cli.command
        else {
            panic!("expected run");
        };
        assert!(!fullscreen);
        assert!(pipeline.pipeline_config().is_err());
    }

    #[test]
    fn unknown_landmark_is_a_parse_error() {
        assert!(Cli::try_parse_from(["depth-touch", "run", "--landmark", "elbow"]).is_err());
    }
}
