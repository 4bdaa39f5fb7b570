//! # Device Sinks
//!
//! A sink takes finished [`DeviceFrame`]s. Writing is two steps: `accept`
//! stages a frame, `commit` makes it visible on the device. The stream loop
//! always calls them back to back under one lock.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::core::frame::DeviceFrame;
use crate::error::StreamResult;

pub mod font;
pub mod pixoo;

pub use pixoo::PixooSink;

/// Destination for device frames.
pub trait DeviceSink: Send {
    /// Stage `frame` for the next commit.
    fn accept(&mut self, frame: &DeviceFrame) -> StreamResult<()>;

    /// Push the staged frame to the device.
    fn commit(&mut self) -> StreamResult<()>;
}

#[derive(Debug, Default)]
struct Recording {
    accepts: u64,
    commits: u64,
    staged: Option<DeviceFrame>,
    committed: VecDeque<DeviceFrame>,
}

/// In-memory sink that records what it was given.
///
/// Clones share the same recording, so a test (or the `--dry-run` CLI path)
/// can keep a handle while the controller owns the boxed sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    recording: Arc<Mutex<Recording>>,
    keep: Option<usize>,
}

impl MemorySink {
    /// Keep every committed frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the `n` most recent committed frames.
    pub fn keep_last(n: usize) -> Self {
        Self {
            recording: Arc::default(),
            keep: Some(n.max(1)),
        }
    }

    pub fn accepts(&self) -> u64 {
        self.recording.lock().accepts
    }

    pub fn commits(&self) -> u64 {
        self.recording.lock().commits
    }

    /// Committed frames, oldest first.
    pub fn frames(&self) -> Vec<DeviceFrame> {
        self.recording.lock().committed.iter().cloned().collect()
    }

    pub fn last_frame(&self) -> Option<DeviceFrame> {
        self.recording.lock().committed.back().cloned()
    }
}

impl DeviceSink for MemorySink {
    fn accept(&mut self, frame: &DeviceFrame) -> StreamResult<()> {
        let mut rec = self.recording.lock();
        rec.accepts += 1;
        rec.staged = Some(frame.clone());
        Ok(())
    }

    fn commit(&mut self) -> StreamResult<()> {
        let mut rec = self.recording.lock();
        rec.commits += 1;
        if let Some(frame) = rec.staged.clone() {
            rec.committed.push_back(frame);
            if let Some(keep) = self.keep {
                while rec.committed.len() > keep {
                    rec.committed.pop_front();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid(v: u8) -> DeviceFrame {
        DeviceFrame::new(RgbImage::from_pixel(64, 64, Rgb([v, v, v]))).unwrap()
    }

    #[test]
    fn clones_share_one_recording() {
        let handle = MemorySink::new();
        let mut boxed: Box<dyn DeviceSink> = Box::new(handle.clone());
        boxed.accept(&solid(1)).unwrap();
        boxed.commit().unwrap();
        assert_eq!(handle.accepts(), 1);
        assert_eq!(handle.commits(), 1);
        assert_eq!(handle.last_frame(), Some(solid(1)));
    }

    #[test]
    fn keep_last_bounds_history() {
        let mut sink = MemorySink::keep_last(2);
        for v in 0..5 {
            sink.accept(&solid(v)).unwrap();
            sink.commit().unwrap();
        }
        assert_eq!(sink.frames(), vec![solid(3), solid(4)]);
        assert_eq!(sink.commits(), 5);
    }
}
