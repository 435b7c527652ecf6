//! The two queues between pipeline stages.
//!
//! Renderer -> differ is a capacity-1 slot: a renderer that gets one frame
//! ahead blocks until the differ takes it, so every produced frame is diffed.
//! Differ -> streamer is an unbounded FIFO of change records.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::time::Duration;

use thiserror::Error;

use crate::format::{ChangeRecord, Frame};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("frame slot closed: the differ has stopped")]
pub struct SlotClosed;

/// Producer half of the frame slot.
#[derive(Clone)]
pub struct FrameSender {
    tx: SyncSender<Frame>,
}

/// Consumer half of the frame slot.
pub struct FrameReceiver {
    rx: Receiver<Frame>,
}

/// Create the capacity-1 frame slot.
pub fn frame_slot() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = mpsc::sync_channel(1);
    (FrameSender { tx }, FrameReceiver { rx })
}

impl FrameSender {
    /// Hand a frame to the differ, blocking while the slot is occupied.
    pub fn send(&self, frame: Frame) -> Result<(), SlotClosed> {
        self.tx.send(frame).map_err(|_| SlotClosed)
    }
}

impl FrameReceiver {
    /// Take the next frame, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Frame, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub type ChangeSender = Sender<ChangeRecord>;
pub type ChangeReceiver = Receiver<ChangeRecord>;

/// Create the unbounded change-record queue.
pub fn change_queue() -> (ChangeSender, ChangeReceiver) {
    mpsc::channel()
}
