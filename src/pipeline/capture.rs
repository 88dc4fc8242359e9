//! Device capture on a background thread with a one-slot hand-off.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded};

/// Read failures in a row before the device is treated as gone.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 30;
pub const RETRY_DELAY: Duration = Duration::from_millis(10);

/// Frames produced by a capture thread. The thread stops and is joined on drop.
#[derive(Debug)]
pub struct CaptureStream<T> {
    label: &'static str,
    frames: Receiver<T>,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

/// Producer half handed to the capture thread.
pub struct FrameSink<T> {
    frames: Sender<T>,
    stale: Receiver<T>,
    stop: Arc<AtomicBool>,
}

impl<T> FrameSink<T> {
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Replace a frame the consumer has not picked up yet.
    pub fn publish(&self, frame: T) {
        let _ = self.stale.try_recv();
        let _ = self.frames.try_send(frame);
    }
}

impl<T: Send + 'static> CaptureStream<T> {
    /// Run `capture` on its own thread. When it returns, its sink is dropped
    /// and `recv_latest` starts failing.
    pub fn spawn<F>(label: &'static str, capture: F) -> Self
    where
        F: FnOnce(FrameSink<T>) -> Result<()> + Send + 'static,
    {
        let (frame_tx, frame_rx) = bounded(1);
        let stop = Arc::new(AtomicBool::new(false));
        let sink = FrameSink {
            frames: frame_tx,
            stale: frame_rx.clone(),
            stop: stop.clone(),
        };

        let handle = thread::spawn(move || match capture(sink) {
            Ok(()) => log::info!("{label} capture stopped"),
            Err(err) => log::error!("{label} capture failed: {err:?}"),
        });

        Self {
            label,
            frames: frame_rx,
            stop,
            handle: Some(handle),
        }
    }
}

impl<T> CaptureStream<T> {
    /// Block until the capture thread hands over a frame, skipping stale ones.
    pub fn recv_latest(&self) -> Result<T> {
        let mut frame = self
            .frames
            .recv()
            .map_err(|_| anyhow!("{} capture thread stopped", self.label))?;
        while let Ok(newer) = self.frames.try_recv() {
            frame = newer;
        }
        Ok(frame)
    }
}

impl<T> Drop for CaptureStream<T> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Call `grab` until the sink is stopped, publishing every frame it yields.
///
/// `Ok(None)` is a frame that was read but dropped. `Err` is a device read
/// failure; after [`MAX_CONSECUTIVE_FAILURES`] of them in a row the last error
/// is returned.
pub fn pump<T, F>(sink: &FrameSink<T>, mut grab: F) -> Result<()>
where
    F: FnMut() -> Result<Option<T>>,
{
    let mut failures = 0;
    while !sink.stopped() {
        match grab() {
            Ok(Some(frame)) => {
                failures = 0;
                sink.publish(frame);
            }
            Ok(None) => failures = 0,
            Err(err) => {
                failures += 1;
                if failures >= MAX_CONSECUTIVE_FAILURES {
                    return Err(err.context(format!("{failures} consecutive read failures")));
                }
                log::warn!("frame read failed ({failures}/{MAX_CONSECUTIVE_FAILURES}): {err:?}");
                thread::sleep(RETRY_DELAY);
            }
        }
    }
    Ok(())
}
