//! Common test utilities shared by the integration tests
//!
//! Synthetic sources stand in for the screen so the stream loop can run
//! headless.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use pixoo_mirror::{
    CaptureSource, DeviceFrame, DeviceSink, MemorySink, PixelFormat, RawImage, StreamError,
    StreamResult,
};

/// RGB image with a horizontal red ramp and a vertical green ramp.
pub fn gradient(width: u32, height: u32) -> RawImage {
    let mut data = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        for x in 0..width {
            data.extend_from_slice(&[
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                ((x + y) % 7 * 30) as u8,
            ]);
        }
    }
    RawImage::packed(data, width, height, PixelFormat::Rgb8)
}

/// Image the processor must reject.
pub fn malformed() -> RawImage {
    RawImage::packed(Vec::new(), 0, 0, PixelFormat::Rgb8)
}

/// Source that plays `script` in order, then repeats its last entry.
pub struct ScriptedSource {
    script: Vec<RawImage>,
    next: usize,
    captures: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(script: Vec<RawImage>, captures: Arc<AtomicUsize>) -> Self {
        Self {
            script,
            next: 0,
            captures,
        }
    }
}

impl CaptureSource for ScriptedSource {
    fn capture_frame(&mut self) -> StreamResult<RawImage> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let index = self.next.min(self.script.len().saturating_sub(1));
        self.next += 1;
        Ok(self.script[index].clone())
    }

    fn describe(&self) -> String {
        format!("scripted source ({} images)", self.script.len())
    }
}

/// Source that fails its first `failures` captures, then serves `image`.
pub struct FailingSource {
    image: RawImage,
    failures: usize,
}

impl FailingSource {
    pub fn new(image: RawImage, failures: usize) -> Self {
        Self { image, failures }
    }
}

impl CaptureSource for FailingSource {
    fn capture_frame(&mut self) -> StreamResult<RawImage> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(StreamError::capture("display went away"));
        }
        Ok(self.image.clone())
    }
}

/// Source that takes `delay` for every capture.
pub struct SlowSource {
    image: RawImage,
    delay: Duration,
}

impl SlowSource {
    pub fn new(image: RawImage, delay: Duration) -> Self {
        Self { image, delay }
    }
}

impl CaptureSource for SlowSource {
    fn capture_frame(&mut self) -> StreamResult<RawImage> {
        std::thread::sleep(self.delay);
        Ok(self.image.clone())
    }
}

/// Sink that rejects every second commit and records the rest in `inner`.
pub struct FlakySink {
    inner: MemorySink,
    attempts: Arc<AtomicUsize>,
}

impl FlakySink {
    pub fn new(inner: MemorySink, attempts: Arc<AtomicUsize>) -> Self {
        Self { inner, attempts }
    }
}

impl DeviceSink for FlakySink {
    fn accept(&mut self, frame: &DeviceFrame) -> StreamResult<()> {
        self.inner.accept(frame)
    }

    fn commit(&mut self) -> StreamResult<()> {
        if self.attempts.fetch_add(1, Ordering::SeqCst) % 2 == 1 {
            return Err(StreamError::sink("device busy"));
        }
        self.inner.commit()
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
