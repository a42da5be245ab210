//! Frame I/O surfaces
//!
//! The link redundancy entity does not own any physical I/O. Each port hands
//! replicas to a `Transmit` implementation and the master port delivers to an
//! `UpperLayer`. The in-memory backends here record what they were given and
//! are used by the `replay` command and the tests.

use crate::dataplane::FrameBuf;
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Egress surface of one port (device transmit queue)
///
/// A full queue is not an error at this layer: implementations accept the
/// frame and drop it on their side.
pub trait Transmit: Send + Sync {
    fn transmit(&self, frame: FrameBuf) -> Result<()>;
}

/// Local protocol stack above the master port
pub trait UpperLayer: Send + Sync {
    fn deliver(&self, frame: FrameBuf) -> Result<()>;
}

/// In-memory port that records every frame it is asked to send
#[derive(Debug, Default)]
pub struct MemoryPort {
    name: String,
    frames: Mutex<Vec<FrameBuf>>,
    failing: AtomicBool,
}

impl MemoryPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frames: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Make subsequent transmits fail (link down)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Remove and return everything sent so far
    pub fn take(&self) -> Vec<FrameBuf> {
        match self.frames.lock() {
            Ok(mut frames) => std::mem::take(&mut *frames),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transmit for MemoryPort {
    fn transmit(&self, frame: FrameBuf) -> Result<()> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(Error::Device {
                name: self.name.clone(),
                reason: "link down".into(),
            });
        }
        self.frames
            .lock()
            .map_err(|_| Error::Device {
                name: self.name.clone(),
                reason: "queue poisoned".into(),
            })?
            .push(frame);
        Ok(())
    }
}

/// In-memory upper layer that records delivered frames
#[derive(Debug, Default)]
pub struct MemoryUpperLayer {
    inner: MemoryPort,
}

impl MemoryUpperLayer {
    pub fn new() -> Self {
        Self {
            inner: MemoryPort::new("upper"),
        }
    }

    /// Make subsequent deliveries fail (backlog full)
    pub fn set_failing(&self, failing: bool) {
        self.inner.set_failing(failing);
    }

    pub fn take(&self) -> Vec<FrameBuf> {
        self.inner.take()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl UpperLayer for MemoryUpperLayer {
    fn deliver(&self, frame: FrameBuf) -> Result<()> {
        self.inner.transmit(frame)
    }
}
