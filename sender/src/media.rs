use std::path::PathBuf;

use anyhow::Context;
use lcdcast_core::{Frame, FrameSource, Geometry};
use tracing::info;

use crate::decode::MediaDecoder;
use crate::resize::FrameResizer;

/// Frame source backed by an image or video file.
pub struct MediaSource {
    path: PathBuf,
    looping: bool,
    decoder: Option<MediaDecoder>,
    resizer: Option<FrameResizer>,
}

impl MediaSource {
    pub fn new(path: PathBuf, looping: bool) -> Self {
        Self {
            path,
            looping,
            decoder: None,
            resizer: None,
        }
    }

    fn decoded(&mut self, geometry: Geometry) -> anyhow::Result<Option<Vec<u8>>> {
        let resizer = self.resizer.get_or_insert_with(|| FrameResizer::new(geometry));
        // a second fresh decoder that yields nothing means the file has no frames
        for _ in 0..2 {
            if self.decoder.is_none() {
                let decoder = MediaDecoder::open(&self.path)
                    .with_context(|| format!("failed to open {}", self.path.display()))?;
                self.decoder = Some(decoder);
            }
            if let Some(frame) = self.decoder.as_mut().and_then(|d| d.next()) {
                return resizer.resize(&frame.data, frame.width, frame.height).map(Some);
            }
            self.decoder = None;
            if !self.looping {
                return Ok(None);
            }
            info!(path = %self.path.display(), "restarting input");
        }
        Ok(None)
    }
}

impl FrameSource for MediaSource {
    fn next_frame(&mut self, geometry: Geometry) -> anyhow::Result<Option<Frame>> {
        match self.decoded(geometry)? {
            Some(rgb) => Ok(Some(Frame::from_rgb24(&rgb)?)),
            None => Ok(None),
        }
    }
}
