use std::path::Path;

use anyhow::Context;
use ffmpeg_sidecar::child::FfmpegChild;
use ffmpeg_sidecar::command::FfmpegCommand;
use ffmpeg_sidecar::event::{FfmpegEvent, LogLevel};
use tracing::warn;

/// One decoded RGB24 picture at source resolution.
pub struct DecodedFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decodes any image or video ffmpeg understands into RGB24 frames.
pub struct MediaDecoder {
    child: FfmpegChild,
    events: Box<dyn Iterator<Item = FfmpegEvent>>,
}

impl MediaDecoder {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let input = path.to_str().context("input path is not valid UTF-8")?;
        let mut child = FfmpegCommand::new()
            .input(input)
            .rawvideo()
            .spawn()
            .context("failed to spawn ffmpeg, is it installed?")?;
        let events = child.iter().context("failed to iterate ffmpeg events")?;
        Ok(Self {
            child,
            events: Box::new(events),
        })
    }
}

impl Iterator for MediaDecoder {
    type Item = DecodedFrame;

    fn next(&mut self) -> Option<Self::Item> {
        for event in &mut self.events {
            match event {
                FfmpegEvent::OutputFrame(frame) => {
                    return Some(DecodedFrame {
                        data: frame.data,
                        width: frame.width,
                        height: frame.height,
                    });
                }
                FfmpegEvent::Error(msg) | FfmpegEvent::Log(LogLevel::Error, msg) => {
                    warn!("ffmpeg: {msg}");
                }
                _ => {}
            }
        }
        None
    }
}

impl Drop for MediaDecoder {
    fn drop(&mut self) {
        let _ = self.child.kill();
    }
}
