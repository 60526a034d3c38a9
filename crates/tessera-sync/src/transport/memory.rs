//! In-process transport; each end sees the other's frames.

use crossbeam_channel::{Receiver, Sender, unbounded};

use super::{FrameSink, FrameSource, Transport};
use crate::error::SyncError;
use crate::protocol::Frame;

pub struct MemoryTransport {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

/// Two connected ends.
pub fn pair() -> (MemoryTransport, MemoryTransport) {
    let (a_tx, a_rx) = unbounded();
    let (b_tx, b_rx) = unbounded();
    (
        MemoryTransport { tx: a_tx, rx: b_rx },
        MemoryTransport { tx: b_tx, rx: a_rx },
    )
}

impl Transport for MemoryTransport {
    fn split(self: Box<Self>) -> (Box<dyn FrameSink>, Box<dyn FrameSource>) {
        (
            Box::new(MemorySink { tx: Some(self.tx) }),
            Box::new(MemorySource { rx: self.rx }),
        )
    }
}

struct MemorySink {
    tx: Option<Sender<Frame>>,
}

impl FrameSink for MemorySink {
    fn send(&mut self, frame: &Frame) -> Result<(), SyncError> {
        let tx = self.tx.as_ref().ok_or(SyncError::Disconnected)?;
        tx.send(frame.clone()).map_err(|_| SyncError::Disconnected)
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

struct MemorySource {
    rx: Receiver<Frame>,
}

impl FrameSource for MemorySource {
    fn recv(&mut self) -> Result<Frame, SyncError> {
        self.rx.recv().map_err(|_| SyncError::Disconnected)
    }
}
