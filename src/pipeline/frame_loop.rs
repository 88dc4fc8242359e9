use std::time::Duration;

use image::RgbImage;

use super::{
    FrameSource, Key, LandmarkDetector, Presenter,
    compositor::{BACKGROUND, blank_canvas, composite, translate},
    depth::normalize_depth,
    gate::evaluate_hands,
};
use crate::{
    config::{DetectorFailurePolicy, PipelineConfig},
    error::PipelineError,
    types::{DepthFrame, GateDecision, HandSkeleton},
};

/// Matches the 5 ms key wait of the display loop.
pub const KEY_POLL: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LoopState {
    Running,
    Stopped,
}

#[derive(Debug)]
pub struct RenderedFrame {
    pub canvas: RgbImage,
    pub decisions: Vec<GateDecision>,
}

impl RenderedFrame {
    /// A skeleton is on screen: a reject only erases hands composited before it,
    /// so the last decision decides.
    pub fn accepted(&self) -> bool {
        self.decisions.last().is_some_and(|d| d.outcome.is_accept())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub frames: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub empty: u64,
    pub detector_failures: u64,
}

impl LoopSummary {
    fn record(&mut self, frame: &RenderedFrame) {
        self.frames += 1;
        if frame.decisions.is_empty() {
            self.empty += 1;
        } else if frame.accepted() {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
    }
}

/// One pipeline pass: gate every hand against `depth`, composite, then shift.
pub fn render_frame(
    depth: &DepthFrame,
    hands: &[HandSkeleton],
    cfg: &PipelineConfig,
) -> RenderedFrame {
    let visual = normalize_depth(depth);
    let canvas = blank_canvas(&visual);
    let decisions = evaluate_hands(hands, depth, cfg.control_landmark, cfg.depth_band);
    let canvas = composite(canvas, &decisions, &cfg.style);
    RenderedFrame {
        canvas: translate(&canvas, cfg.offset, BACKGROUND),
        decisions,
    }
}

/// Closes the detector when dropped, whichever way the loop ends.
struct DetectorGuard<D: LandmarkDetector> {
    detector: D,
    closed: bool,
}

impl<D: LandmarkDetector> DetectorGuard<D> {
    fn new(detector: D) -> Self {
        Self {
            detector,
            closed: false,
        }
    }

    fn get(&mut self) -> &mut D {
        &mut self.detector
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.detector.close();
        }
    }
}

impl<D: LandmarkDetector> Drop for DetectorGuard<D> {
    fn drop(&mut self) {
        self.close();
    }
}

fn next_state(key: Option<Key>, frames: u64, max_frames: Option<u64>) -> LoopState {
    match key {
        Some(Key::Escape) | Some(Key::Closed) => return LoopState::Stopped,
        Some(Key::Other) | None => {}
    }
    match max_frames {
        Some(limit) if frames >= limit => LoopState::Stopped,
        _ => LoopState::Running,
    }
}

pub fn run_frame_loop<S, D, P>(
    source: &mut S,
    detector: D,
    presenter: &mut P,
    cfg: &PipelineConfig,
) -> Result<LoopSummary, PipelineError>
where
    S: FrameSource,
    D: LandmarkDetector,
    P: Presenter,
{
    let mut detector = DetectorGuard::new(detector);
    let mut summary = LoopSummary::default();
    let mut state = LoopState::Running;

    while state == LoopState::Running {
        let depth = source
            .acquire_depth()
            .map_err(PipelineError::Acquisition)?;
        if depth.width != cfg.resolution.width || depth.height != cfg.resolution.height {
            return Err(PipelineError::DepthResolution {
                got_w: depth.width,
                got_h: depth.height,
                want_w: cfg.resolution.width,
                want_h: cfg.resolution.height,
            });
        }
        let color = source
            .acquire_color()
            .map_err(PipelineError::Acquisition)?;

        let hands = match detector.get().process(&color) {
            Ok(hands) => hands,
            Err(err) => match cfg.on_detector_error {
                DetectorFailurePolicy::Skip => {
                    log::warn!("landmark detection failed, rendering frame without hands: {err:?}");
                    summary.detector_failures += 1;
                    Vec::new()
                }
                DetectorFailurePolicy::Abort => return Err(PipelineError::Detector(err)),
            },
        };

        let frame = render_frame(&depth, &hands, cfg);
        summary.record(&frame);
        presenter
            .show(&frame.canvas)
            .map_err(PipelineError::Presenter)?;

        state = next_state(presenter.poll_key(KEY_POLL), summary.frames, cfg.max_frames);
    }

    detector.close();
    log::info!(
        "frame loop stopped after {} frames ({} accepted, {} rejected, {} without hands, {} detector failures)",
        summary.frames,
        summary.accepted,
        summary.rejected,
        summary.empty,
        summary.detector_failures
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, collections::VecDeque, rc::Rc};

    use anyhow::{Result, anyhow};
    use image::Rgb;

    use super::*;
    use crate::{
        config::Offset,
        pipeline::{
            capture::{CaptureStream, pump},
            compositor::{CANVAS_BLACK, CANVAS_WHITE},
        },
        types::{ColorFrame, HandLandmark, Landmark, NUM_LANDMARKS},
    };

    fn centred_hand() -> HandSkeleton {
        let mut landmarks = [Landmark::new(0.3, 0.3, 0.0); NUM_LANDMARKS];
        landmarks[HandLandmark::IndexFingerTip.index()] = Landmark::new(0.5, 0.5, 0.0);
        HandSkeleton::new(landmarks)
    }

    fn depth_with_tip(value: u16) -> DepthFrame {
        let mut depth = DepthFrame::filled(640, 480, 0);
        depth.set(320, 240, value);
        depth
    }

    struct FakeSource {
        depth: DepthFrame,
        fail_after: Option<u64>,
        served: u64,
    }

    impl FakeSource {
        fn new(depth: DepthFrame) -> Self {
            Self {
                depth,
                fail_after: None,
                served: 0,
            }
        }
    }

    impl FrameSource for FakeSource {
        fn acquire_depth(&mut self) -> Result<DepthFrame> {
            if self.fail_after.is_some_and(|limit| self.served >= limit) {
                return Err(anyhow!("sensor unplugged"));
            }
            self.served += 1;
            Ok(self.depth.clone())
        }

        fn acquire_color(&mut self) -> Result<ColorFrame> {
            Ok(ColorFrame::new(RgbImage::new(640, 480)))
        }
    }

    struct FakeDetector {
        results: VecDeque<Result<Vec<HandSkeleton>>>,
        closes: Rc<Cell<u32>>,
    }

    impl FakeDetector {
        fn new(results: Vec<Result<Vec<HandSkeleton>>>) -> (Self, Rc<Cell<u32>>) {
            let closes = Rc::new(Cell::new(0));
            (
                Self {
                    results: results.into(),
                    closes: closes.clone(),
                },
                closes,
            )
        }
    }

    impl LandmarkDetector for FakeDetector {
        fn process(&mut self, _frame: &ColorFrame) -> Result<Vec<HandSkeleton>> {
            self.results.pop_front().unwrap_or_else(|| Ok(Vec::new()))
        }

        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    #[derive(Default)]
    struct FakePresenter {
        shown: Vec<RgbImage>,
        keys: VecDeque<Key>,
    }

    impl Presenter for FakePresenter {
        fn show(&mut self, canvas: &RgbImage) -> Result<()> {
            self.shown.push(canvas.clone());
            Ok(())
        }

        fn poll_key(&mut self, _timeout: Duration) -> Option<Key> {
            self.keys.pop_front()
        }
    }

    fn cfg_frames(n: u64) -> PipelineConfig {
        PipelineConfig {
            max_frames: Some(n),
            ..Default::default()
        }
    }

    #[test]
    fn accepted_hand_is_drawn_and_translated() {
        let cfg = PipelineConfig::default();
        let frame = render_frame(&depth_with_tip(650), &[centred_hand()], &cfg);
        assert!(frame.accepted());
        assert_eq!(frame.canvas.dimensions(), (640, 480));

        // Index tip dot lands at (320 + 20, 240 + 110).
        assert_eq!(frame.canvas.get_pixel(340, 350), &Rgb([255, 0, 0]));
        // Exposed strips are background, the rest of the canvas stays white.
        assert_eq!(frame.canvas.get_pixel(5, 300), &CANVAS_BLACK);
        assert_eq!(frame.canvas.get_pixel(300, 50), &CANVAS_BLACK);
        assert_eq!(frame.canvas.get_pixel(600, 450), &CANVAS_WHITE);
    }

    #[test]
    fn rejected_hand_blacks_out_canvas() {
        let cfg = PipelineConfig::default();
        let frame = render_frame(&depth_with_tip(700), &[centred_hand()], &cfg);
        assert!(!frame.accepted());
        assert!(frame.canvas.pixels().all(|p| *p == CANVAS_BLACK));
    }

    #[test]
    fn no_hands_gives_default_canvas_for_any_depth() {
        let cfg = PipelineConfig::default();
        let a = render_frame(&depth_with_tip(650), &[], &cfg);
        let b = render_frame(&DepthFrame::filled(640, 480, 1023), &[], &cfg);
        assert_eq!(a.canvas, b.canvas);
        assert!(a.decisions.is_empty());

        let untranslated = PipelineConfig {
            offset: Offset { dx: 0, dy: 0 },
            ..Default::default()
        };
        let plain = render_frame(&depth_with_tip(650), &[], &untranslated);
        assert!(plain.canvas.pixels().all(|p| *p == CANVAS_WHITE));
    }

    #[test]
    fn second_hand_reject_wipes_first_hand() {
        let cfg = PipelineConfig::default();
        let mut far = centred_hand();
        far.landmarks[HandLandmark::IndexFingerTip.index()] = Landmark::new(0.75, 0.75, 0.0);
        let frame = render_frame(&depth_with_tip(650), &[centred_hand(), far], &cfg);
        assert_eq!(frame.decisions.len(), 2);
        assert!(frame.canvas.pixels().all(|p| *p == CANVAS_BLACK));
    }

    #[test]
    fn hand_accepted_after_reject_is_drawn_on_black() {
        let cfg = PipelineConfig::default();
        let mut far = centred_hand();
        far.landmarks[HandLandmark::IndexFingerTip.index()] = Landmark::new(0.75, 0.75, 0.0);
        let frame = render_frame(&depth_with_tip(650), &[far, centred_hand()], &cfg);

        assert!(frame.accepted());
        assert_eq!(frame.canvas.get_pixel(340, 350), &Rgb([255, 0, 0]));
        assert_eq!(frame.canvas.get_pixel(600, 450), &CANVAS_BLACK);

        let mut summary = LoopSummary::default();
        summary.record(&frame);
        assert_eq!((summary.accepted, summary.rejected), (1, 0));
    }

    #[test]
    fn disconnected_capture_thread_ends_loop() {
        struct StreamSource {
            depth: CaptureStream<DepthFrame>,
        }

        impl FrameSource for StreamSource {
            fn acquire_depth(&mut self) -> Result<DepthFrame> {
                self.depth.recv_latest()
            }

            fn acquire_color(&mut self) -> Result<ColorFrame> {
                Ok(ColorFrame::new(RgbImage::new(640, 480)))
            }
        }

        let mut source = StreamSource {
            depth: CaptureStream::spawn("depth", |sink| {
                sink.publish(depth_with_tip(650));
                pump(&sink, || Err(anyhow!("device unplugged")))
            }),
        };
        let (detector, closes) = FakeDetector::new(Vec::new());
        let mut presenter = FakePresenter::default();

        let err = run_frame_loop(&mut source, detector, &mut presenter, &cfg_frames(10))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Acquisition(_)));
        assert_eq!(presenter.shown.len(), 1);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn stops_on_escape_and_closes_detector_once() {
        let mut source = FakeSource::new(depth_with_tip(650));
        let (detector, closes) = FakeDetector::new(vec![Ok(vec![centred_hand()])]);
        let mut presenter = FakePresenter {
            keys: VecDeque::from([Key::Other, Key::Escape]),
            ..Default::default()
        };

        let summary = run_frame_loop(
            &mut source,
            detector,
            &mut presenter,
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(summary.frames, 2);
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.empty, 1);
        assert_eq!(presenter.shown.len(), 2);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn stops_when_window_closes() {
        let mut source = FakeSource::new(depth_with_tip(700));
        let (detector, closes) = FakeDetector::new(vec![Ok(vec![centred_hand()])]);
        let mut presenter = FakePresenter {
            keys: VecDeque::from([Key::Closed]),
            ..Default::default()
        };
        let summary = run_frame_loop(
            &mut source,
            detector,
            &mut presenter,
            &PipelineConfig::default(),
        )
        .unwrap();
        assert_eq!(summary.frames, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn acquisition_failure_is_fatal_and_releases_detector() {
        let mut source = FakeSource::new(depth_with_tip(650));
        source.fail_after = Some(1);
        let (detector, closes) = FakeDetector::new(Vec::new());
        let mut presenter = FakePresenter::default();

        let err = run_frame_loop(&mut source, detector, &mut presenter, &cfg_frames(10))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Acquisition(_)));
        assert_eq!(presenter.shown.len(), 1);
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn wrong_depth_resolution_is_fatal() {
        let mut source = FakeSource::new(DepthFrame::filled(320, 240, 0));
        let (detector, closes) = FakeDetector::new(Vec::new());
        let mut presenter = FakePresenter::default();
        let err = run_frame_loop(&mut source, detector, &mut presenter, &cfg_frames(1))
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DepthResolution {
                got_w: 320,
                got_h: 240,
                ..
            }
        ));
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn detector_failure_skips_frame_by_default() {
        let mut source = FakeSource::new(depth_with_tip(650));
        let (detector, _closes) = FakeDetector::new(vec![
            Err(anyhow!("malformed frame")),
            Ok(vec![centred_hand()]),
        ]);
        let mut presenter = FakePresenter::default();

        let summary =
            run_frame_loop(&mut source, detector, &mut presenter, &cfg_frames(2)).unwrap();
        assert_eq!(summary.detector_failures, 1);
        assert_eq!(summary.empty, 1);
        assert_eq!(summary.accepted, 1);
        assert_eq!(presenter.shown.len(), 2);
    }

    #[test]
    fn detector_failure_aborts_when_configured() {
        let mut source = FakeSource::new(depth_with_tip(650));
        let (detector, closes) = FakeDetector::new(vec![Err(anyhow!("malformed frame"))]);
        let mut presenter = FakePresenter::default();
        let cfg = PipelineConfig {
            on_detector_error: DetectorFailurePolicy::Abort,
            ..cfg_frames(5)
        };

        let err = run_frame_loop(&mut source, detector, &mut presenter, &cfg).unwrap_err();
        assert!(matches!(err, PipelineError::Detector(_)));
        assert!(presenter.shown.is_empty());
        assert_eq!(closes.get(), 1);
    }
}
