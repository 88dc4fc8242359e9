use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use image::RgbImage;
use minifb::{Scale, Window, WindowOptions};

use super::{Key, Presenter};

pub const WINDOW_TITLE: &str = "touch";

/// Borderless minifb window showing the composited canvas.
pub struct WindowPresenter {
    window: Window,
    buf: Vec<u32>,
    width: usize,
    height: usize,
    pacing: Option<Duration>,
}

impl WindowPresenter {
    /// `fullscreen` scales the canvas to fit the screen and keeps the window
    /// above others, for use as a projector overlay.
    pub fn new(width: u32, height: u32, fullscreen: bool) -> Result<Self> {
        let (width, height) = (width as usize, height as usize);
        let window = Window::new(WINDOW_TITLE, width, height, window_options(fullscreen))
            .map_err(|err| anyhow!("failed to open display window: {err}"))?;

        Ok(Self {
            window,
            buf: vec![0; width * height],
            width,
            height,
            pacing: None,
        })
    }
}

fn window_options(fullscreen: bool) -> WindowOptions {
    WindowOptions {
        borderless: true,
        resize: false,
        scale: if fullscreen { Scale::FitScreen } else { Scale::X1 },
        topmost: fullscreen,
        ..WindowOptions::default()
    }
}

/// Frame rate that makes each buffer update wait out `timeout`. Zero disables pacing.
fn target_fps(timeout: Duration) -> usize {
    if timeout.is_zero() {
        return 0;
    }
    (1.0 / timeout.as_secs_f64()).round().max(1.0) as usize
}

/// Map the keys currently held to the loop's key events.
fn key_event(keys: &[minifb::Key]) -> Option<Key> {
    if keys.contains(&minifb::Key::Escape) {
        Some(Key::Escape)
    } else if keys.is_empty() {
        None
    } else {
        Some(Key::Other)
    }
}

impl Presenter for WindowPresenter {
    fn show(&mut self, canvas: &RgbImage) -> Result<()> {
        if canvas.width() as usize != self.width || canvas.height() as usize != self.height {
            return Err(anyhow!(
                "canvas is {}x{}, window is {}x{}",
                canvas.width(),
                canvas.height(),
                self.width,
                self.height
            ));
        }
        pack_rgb(canvas, &mut self.buf);
        self.window
            .update_with_buffer(&self.buf, self.width, self.height)
            .map_err(|err| anyhow!("failed to present frame: {err}"))
    }

    /// Reads the key state pumped by the last `show`. The wait itself happens in
    /// the next buffer update, paced to `timeout`.
    fn poll_key(&mut self, timeout: Duration) -> Option<Key> {
        if self.pacing != Some(timeout) {
            self.window.set_target_fps(target_fps(timeout));
            self.pacing = Some(timeout);
        }
        if !self.window.is_open() {
            return Some(Key::Closed);
        }
        key_event(&self.window.get_keys())
    }
}

/// Convert an RGB canvas into minifb's 0RGB words.
fn pack_rgb(canvas: &RgbImage, buf: &mut Vec<u32>) {
    buf.clear();
    buf.extend(
        canvas
            .pixels()
            .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
    );
}

/// Headless presenter that keeps the newest canvas and writes it on `save`.
#[derive(Debug)]
pub struct PngPresenter {
    path: PathBuf,
    last: Option<RgbImage>,
}

impl PngPresenter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last(&self) -> Option<&RgbImage> {
        self.last.as_ref()
    }

    pub fn save(&self) -> Result<()> {
        let canvas = self
            .last
            .as_ref()
            .ok_or_else(|| anyhow!("no frame was rendered"))?;
        canvas
            .save(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        log::info!("wrote last frame to {}", self.path.display());
        Ok(())
    }
}

impl Presenter for PngPresenter {
    fn show(&mut self, canvas: &RgbImage) -> Result<()> {
        match self.last.as_mut() {
            Some(last) if last.dimensions() == canvas.dimensions() => {
                last.copy_from_slice(canvas.as_raw());
            }
            _ => self.last = Some(canvas.clone()),
        }
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> Option<Key> {
        None
    }
}
