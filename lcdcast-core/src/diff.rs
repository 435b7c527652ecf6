use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;

use tracing::{debug, info};

use crate::format::{ChangeRecord, Frame, FrameError, Geometry, Rgb565};
use crate::handoff::{ChangeSender, FrameReceiver};
use crate::stats::StreamStats;

/// Outcome of one diff pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DiffStats {
    pub changed: usize,
    pub total: usize,
}

impl DiffStats {
    /// Fraction of pixels that matched the cache, 0.0..=1.0.
    pub fn similarity(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.total - self.changed) as f64 / self.total as f64
    }
}

/// Compares frames against the last colour sent for every pixel.
///
/// The cache starts empty (`None` everywhere), which matches no colour code,
/// so the first frame emits every pixel.
pub struct FrameDiffer {
    geometry: Geometry,
    cache: Vec<Option<Rgb565>>,
}

impl FrameDiffer {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            cache: vec![None; geometry.pixel_count()],
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Forget everything sent so far; the next diff emits a full frame.
    pub fn reset(&mut self) {
        self.cache.fill(None);
    }

    /// Last code recorded for `index`, if any.
    pub fn cached(&self, index: usize) -> Option<Rgb565> {
        self.cache.get(index).copied().flatten()
    }

    /// Diff `frame`, collecting the changed pixels in ascending index order.
    pub fn diff(&mut self, frame: &Frame) -> Result<(Vec<ChangeRecord>, DiffStats), FrameError> {
        let mut records = Vec::new();
        let stats = self.diff_with(frame, |rec| records.push(rec))?;
        Ok((records, stats))
    }

    /// Diff `frame`, handing each changed pixel to `emit` before the cache
    /// entry is updated. A frame of the wrong size is rejected untouched.
    pub fn diff_with(
        &mut self,
        frame: &Frame,
        mut emit: impl FnMut(ChangeRecord),
    ) -> Result<DiffStats, FrameError> {
        if frame.len() != self.cache.len() {
            return Err(FrameError::WrongPixelCount {
                expected: self.cache.len(),
                found: frame.len(),
            });
        }

        let mut changed = 0;
        for (index, (px, slot)) in frame.pixels().iter().zip(self.cache.iter_mut()).enumerate() {
            let code = Rgb565::quantize(*px);
            if *slot != Some(code) {
                let (x, y) = self.geometry.position(index);
                emit(ChangeRecord::new(x, y, code));
                *slot = Some(code);
                changed += 1;
            }
        }

        Ok(DiffStats {
            changed,
            total: self.cache.len(),
        })
    }
}

/// Differ worker: take frames from the slot, diff them, queue the changes.
///
/// Returns when `stop` is set, when the renderer hangs up, or when the
/// streamer's queue is gone. A malformed frame ends the worker with an error.
pub fn run_differ(
    mut differ: FrameDiffer,
    frames: FrameReceiver,
    changes: ChangeSender,
    stats: &StreamStats,
    stop: &AtomicBool,
    poll: Duration,
    verbose: bool,
) -> Result<(), FrameError> {
    while !stop.load(Ordering::Relaxed) {
        let frame = match frames.recv_timeout(poll) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("frame slot closed, differ exiting");
                break;
            }
        };

        let mut queue_open = true;
        let result = differ.diff_with(&frame, |rec| {
            if queue_open && changes.send(rec).is_err() {
                queue_open = false;
            }
        })?;
        stats.record_frame(result.changed);

        if verbose {
            info!(
                changed = result.changed,
                "frame similarity {:.2}%",
                result.similarity() * 100.0
            );
        }

        if !queue_open {
            debug!("change queue closed, differ exiting");
            break;
        }
    }
    Ok(())
}
