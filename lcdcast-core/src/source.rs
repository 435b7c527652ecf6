use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, info};

use crate::format::{Frame, Geometry, Rgb};
use crate::handoff::FrameSender;

/// Anything that can compose the next full frame for the display.
pub trait FrameSource {
    /// Produce one frame of exactly `geometry.pixel_count()` pixels.
    /// `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self, geometry: Geometry) -> anyhow::Result<Option<Frame>>;
}

impl<F> FrameSource for F
where
    F: FnMut(Geometry) -> anyhow::Result<Option<Frame>>,
{
    fn next_frame(&mut self, geometry: Geometry) -> anyhow::Result<Option<Frame>> {
        self(geometry)
    }
}

/// Scrolling colour bars with a white marker sweeping across them.
/// Useful for checking a display without any assets.
#[derive(Default)]
pub struct PatternSource {
    tick: u32,
}

const BARS: [Rgb; 8] = [
    Rgb::new(255, 255, 255),
    Rgb::new(255, 255, 0),
    Rgb::new(0, 255, 255),
    Rgb::new(0, 255, 0),
    Rgb::new(255, 0, 255),
    Rgb::new(255, 0, 0),
    Rgb::new(0, 0, 255),
    Rgb::new(0, 0, 0),
];

impl PatternSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSource for PatternSource {
    fn next_frame(&mut self, geometry: Geometry) -> anyhow::Result<Option<Frame>> {
        let w = geometry.width as u32;
        let h = geometry.height as u32;
        let bar_width = (w / BARS.len() as u32).max(1);
        let marker = self.tick % w.max(1);

        let mut pixels = Vec::with_capacity(geometry.pixel_count());
        for y in 0..h {
            for x in 0..w {
                let px = if x == marker || (y == h / 2 && x.abs_diff(marker) < 3) {
                    Rgb::WHITE
                } else {
                    let bar = (x.wrapping_add(self.tick) / bar_width) as usize % BARS.len();
                    // darken the lower half so rows differ
                    let c = BARS[bar];
                    if y >= h / 2 {
                        Rgb::new(c.r / 2, c.g / 2, c.b / 2)
                    } else {
                        c
                    }
                };
                pixels.push(px);
            }
        }

        self.tick = self.tick.wrapping_add(1);
        Ok(Some(Frame::new(pixels)))
    }
}

/// Render loop: pull frames from `source` and push them into the slot at
/// most `fps` times per second.
///
/// Ends when `stop` is set, the source is exhausted, or the differ has
/// closed the slot. Returns the number of frames handed off.
pub fn run_renderer<S: FrameSource + ?Sized>(
    source: &mut S,
    geometry: Geometry,
    fps: f64,
    frames: &FrameSender,
    stop: &AtomicBool,
) -> anyhow::Result<u64> {
    anyhow::ensure!(fps > 0.0, "render frame rate must be positive, got {fps}");
    let frame_time = Duration::try_from_secs_f64(1.0 / fps)
        .with_context(|| format!("render frame rate {fps} is too low to pace"))?;
    let mut produced = 0u64;

    while !stop.load(Ordering::Relaxed) {
        let started = Instant::now();

        let Some(frame) = source.next_frame(geometry)? else {
            info!(frames = produced, "frame source exhausted");
            break;
        };
        if frames.send(frame).is_err() {
            debug!("frame slot closed, renderer exiting");
            break;
        }
        produced += 1;

        if let Some(rest) = frame_time.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    Ok(produced)
}
