use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use thiserror::Error;

use crate::format::Geometry;

/// UDP port the display firmware listens on.
pub const DEFAULT_PORT: u16 = 4300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("display geometry must be non-zero, got {width}x{height}")]
    EmptyGeometry { width: u16, height: u16 },

    #[error("refresh rate must be at least 1 Hz")]
    ZeroRefreshRate,

    #[error("max block size must be at least 1 record")]
    ZeroBlockSize,

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Start-up configuration for the streaming pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Where datagrams are sent.
    pub display: SocketAddr,
    pub geometry: Geometry,
    /// Longest a single pop from the change queue may wait.
    pub pipe_timeout: Duration,
    /// Longest the streamer spends collecting one batch.
    pub max_frame_time: Duration,
    /// Upper bound on datagrams per second.
    pub refresh_rate: u32,
    /// Upper bound on change records per datagram.
    pub max_block_size: usize,
    /// Emit advisory diagnostics (similarity, underflow, banner).
    pub verbose: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            display: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            geometry: Geometry::default(),
            pipe_timeout: Duration::from_millis(100),
            max_frame_time: Duration::from_millis(100),
            refresh_rate: 50,
            max_block_size: 200,
            verbose: false,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.geometry.pixel_count() == 0 {
            return Err(ConfigError::EmptyGeometry {
                width: self.geometry.width,
                height: self.geometry.height,
            });
        }
        if self.refresh_rate == 0 {
            return Err(ConfigError::ZeroRefreshRate);
        }
        if self.max_block_size == 0 {
            return Err(ConfigError::ZeroBlockSize);
        }
        if self.pipe_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("pipe timeout"));
        }
        if self.max_frame_time.is_zero() {
            return Err(ConfigError::ZeroDuration("max frame time"));
        }
        Ok(())
    }

    /// Minimum time between two transmitted datagrams.
    pub fn cycle_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_rate.max(1) as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = StreamConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.cycle_period(), Duration::from_millis(20));
        assert_eq!(config.display.port(), 4300);
    }

    #[test]
    fn rejects_degenerate_values() {
        let mut config = StreamConfig {
            geometry: Geometry::new(0, 80),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::EmptyGeometry { .. })));

        config.geometry = Geometry::default();
        config.refresh_rate = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroRefreshRate));

        config.refresh_rate = 50;
        config.max_block_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroBlockSize));

        config.max_block_size = 200;
        config.pipe_timeout = Duration::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::ZeroDuration("pipe timeout")));
    }
}
