mod decode;
mod media;
mod resize;

use std::io::BufRead;
use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use lcdcast_core::{
    run_renderer, DisplayDriver, FrameSource, Geometry, PatternSource, StreamConfig, UdpTransport,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::media::MediaSource;

#[derive(Parser)]
#[command(name = "lcdcast-send", about = "Stream frames to a UDP pixel display")]
struct Cli {
    /// Image or video to stream (default: built-in test pattern)
    input: Option<PathBuf>,

    /// Display host name or IP address
    #[arg(long, env = "LCDCAST_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Display UDP port
    #[arg(long, env = "LCDCAST_PORT", default_value_t = lcdcast_core::config::DEFAULT_PORT)]
    port: u16,

    /// Display width in pixels
    #[arg(long, env = "LCDCAST_WIDTH", default_value_t = lcdcast_core::WIDTH)]
    width: u16,

    /// Display height in pixels
    #[arg(long, env = "LCDCAST_HEIGHT", default_value_t = lcdcast_core::HEIGHT)]
    height: u16,

    /// Frames rendered per second
    #[arg(long, env = "LCDCAST_FPS", default_value_t = 10.0)]
    fps: f64,

    /// Datagrams sent per second, at most
    #[arg(long, env = "LCDCAST_REFRESH_RATE", default_value_t = 50)]
    refresh_rate: u32,

    /// Change records per datagram, at most
    #[arg(long, env = "LCDCAST_MAX_BLOCK_SIZE", default_value_t = 200)]
    max_block_size: usize,

    /// Longest wait for one change record, in milliseconds
    #[arg(long, env = "LCDCAST_PIPE_TIMEOUT_MS", default_value_t = 100)]
    pipe_timeout_ms: u64,

    /// Longest time spent filling one datagram, in milliseconds
    #[arg(long, env = "LCDCAST_MAX_FRAME_TIME_MS", default_value_t = 100)]
    max_frame_time_ms: u64,

    /// Restart the input when it ends
    #[arg(long = "loop")]
    looping: bool,

    /// Log per-frame similarity and queue underflows
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn stream_config(&self) -> anyhow::Result<StreamConfig> {
        let display = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("{} has no addresses", self.host))?;

        let config = StreamConfig {
            display,
            geometry: Geometry::new(self.width, self.height),
            pipe_timeout: Duration::from_millis(self.pipe_timeout_ms),
            max_frame_time: Duration::from_millis(self.max_frame_time_ms),
            refresh_rate: self.refresh_rate,
            max_block_size: self.max_block_size,
            verbose: self.verbose,
        };
        config.validate()?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.stream_config()?;
    let geometry = config.geometry;
    let transport = UdpTransport::new(config.display)
        .with_context(|| format!("failed to open UDP socket for {}", config.display))?;
    info!(display = %transport.target(), "streaming {}x{}", geometry.width, geometry.height);

    let mut source: Box<dyn FrameSource> = match &cli.input {
        Some(path) => Box::new(MediaSource::new(path.clone(), cli.looping)),
        None => Box::new(PatternSource::new()),
    };

    let driver = DisplayDriver::start(config, transport)?;
    let stop = driver.stop_flag();

    // Enter on stdin stops the stream; a closed stdin is ignored
    {
        let stop = stop.clone();
        thread::spawn(move || {
            let mut line = String::new();
            if let Ok(n) = std::io::stdin().lock().read_line(&mut line) {
                if n > 0 {
                    stop.store(true, Ordering::Relaxed);
                }
            }
        });
    }
    eprintln!("Press Enter to stop.");

    let frames = driver.frames();
    let rendered = run_renderer(source.as_mut(), geometry, cli.fps, &frames, &stop);
    drop(frames);

    let stats = driver.join()?;
    let rendered = rendered?;
    info!(
        rendered,
        diffed = stats.frames_diffed,
        records = stats.records_emitted,
        datagrams = stats.batches_sent,
        send_failures = stats.send_failures,
        underflows = stats.underflows,
        "stream finished"
    );

    Ok(())
}
