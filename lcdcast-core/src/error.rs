use thiserror::Error;

use crate::config::ConfigError;
use crate::format::FrameError;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn {worker} worker")]
    Spawn {
        worker: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("differ stopped on a malformed frame")]
    Frame(#[from] FrameError),

    #[error("{0} worker panicked")]
    Panicked(&'static str),
}

pub type Result<T> = std::result::Result<T, DriverError>;
