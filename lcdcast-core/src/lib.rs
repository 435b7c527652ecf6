pub mod config;
pub mod decode;
pub mod diff;
pub mod driver;
pub mod encode;
pub mod error;
pub mod format;
pub mod handoff;
pub mod source;
pub mod stats;
pub mod stream;

pub use config::StreamConfig;
pub use driver::DisplayDriver;
pub use format::{ChangeRecord, Frame, Geometry, Rgb, Rgb565, HEIGHT, WIDTH};
pub use source::{run_renderer, FrameSource, PatternSource};
pub use stream::{Transport, UdpTransport};
