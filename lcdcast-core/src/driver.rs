use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::info;

use crate::config::StreamConfig;
use crate::diff::{run_differ, FrameDiffer};
use crate::error::{DriverError, Result};
use crate::format::FrameError;
use crate::handoff::{change_queue, frame_slot, FrameSender};
use crate::stats::{StatsSnapshot, StreamStats};
use crate::stream::{Transport, UpdateStreamer};

/// Owns the differ and streamer workers for one display.
///
/// Frames go in through [`DisplayDriver::frames`]; change records flow
/// from the differ to the streamer over an unbounded queue; the streamer
/// owns the transport.
///
/// There is no acknowledgement on the wire. A lost datagram leaves the
/// display stale for those pixels until they change again, because the
/// differ's cache already holds the new colours.
pub struct DisplayDriver {
    frames: FrameSender,
    stop: Arc<AtomicBool>,
    stats: Arc<StreamStats>,
    differ: JoinHandle<std::result::Result<(), FrameError>>,
    streamer: JoinHandle<()>,
}

impl DisplayDriver {
    /// Validate `config` and spawn both workers.
    pub fn start<T: Transport + 'static>(config: StreamConfig, transport: T) -> Result<Self> {
        config.validate()?;

        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(StreamStats::default());
        let (frame_tx, frame_rx) = frame_slot();
        let (change_tx, change_rx) = change_queue();

        let streamer = UpdateStreamer::new(transport, &config, stats.clone());
        let streamer = {
            let stop = stop.clone();
            thread::Builder::new()
                .name("lcdcast-streamer".into())
                .spawn(move || streamer.run(change_rx, &stop))
                .map_err(|source| DriverError::Spawn { worker: "streamer", source })?
        };

        let differ = {
            let stop = stop.clone();
            let stats = stats.clone();
            let differ = FrameDiffer::new(config.geometry);
            let poll = config.pipe_timeout;
            let verbose = config.verbose;
            thread::Builder::new()
                .name("lcdcast-differ".into())
                .spawn(move || run_differ(differ, frame_rx, change_tx, &stats, &stop, poll, verbose))
                .map_err(|source| DriverError::Spawn { worker: "differ", source })?
        };

        if config.verbose {
            info!("verbose enabled");
            info!(
                display = %config.display,
                width = config.geometry.width,
                height = config.geometry.height,
                refresh_rate = config.refresh_rate,
                "display driver started"
            );
        }

        Ok(Self {
            frames: frame_tx,
            stop,
            stats,
            differ,
            streamer,
        })
    }

    /// Producer half of the frame slot, for the render loop.
    pub fn frames(&self) -> FrameSender {
        self.frames.clone()
    }

    /// The shared stop flag; setting it stops every worker that watches it.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Ask all workers to finish. Each notices within one pipe timeout.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Wait for both workers and return the final counters.
    ///
    /// Without a prior [`stop`](Self::stop) this returns once every frame
    /// sender is dropped and the queued changes have been flushed.
    pub fn join(self) -> Result<StatsSnapshot> {
        let Self { frames, stats, differ, streamer, .. } = self;
        drop(frames);
        let differ = differ.join().map_err(|_| DriverError::Panicked("differ"))?;
        streamer.join().map_err(|_| DriverError::Panicked("streamer"))?;
        differ?;
        Ok(stats.snapshot())
    }
}
