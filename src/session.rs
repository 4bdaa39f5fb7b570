//! # Stream Session Management
//!
//! [`StreamController`] owns the stream loop and the one-shot actions that
//! share its collaborators.
//!
//! ## Lifecycle
//!
//! ```text
//!            start() [sink connected]
//!   Stopped ─────────────────────────▶ Running
//!      ▲                                  │
//!      └──────────── stop() ◀─────────────┘
//! ```
//!
//! While running, a named background thread (`pixoo-stream`) repeats one
//! tick at the configured rate:
//!
//! 1. wait for a sink if none is connected (not an error)
//! 2. capture a [`RawImage`] and remember it as the last source
//! 3. process it with a snapshot of the live [`ProcessingConfig`]
//! 4. `accept` + `commit` on the sink
//! 5. render and publish the preview
//! 6. sleep whatever is left of the frame budget
//!
//! A failing step skips the rest of that tick only. Stopping is cooperative:
//! the worker checks its [`StopToken`] between ticks, and [`StreamController::stop`]
//! joins it, so nothing reaches the sink after `stop` returns.
//!
//! One-shot actions (`show_static`, `capture_once`) run on the caller's
//! thread and are refused with [`StreamError::Busy`] while the loop owns the
//! sink.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::capture::{CaptureSource, ScreenSource, SourceFactory, load_static};
use crate::config::{ProcessingConfig, SharedConfig, StreamConfig};
use crate::core::frame::{DeviceFrame, PreviewFrame, RawImage};
use crate::error::{Recoverable, StreamError, StreamResult};
use crate::processing::{ImageProcessor, PreviewRenderer};
use crate::sink::DeviceSink;

/// Whatever displays previews: a window, a file on disk, or nothing.
pub trait PreviewSurface: Send + Sync {
    /// Called with every freshly rendered preview.
    fn publish(&self, preview: &PreviewFrame);

    /// Called when a tick or one-shot action fails.
    fn notify_error(&self, _error: &StreamError) {}
}

/// Discards previews.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSurface;

impl PreviewSurface for NullSurface {
    fn publish(&self, _preview: &PreviewFrame) {}
}

#[derive(Debug, Default)]
struct PreviewSlot {
    latest: Option<PreviewFrame>,
    published: u64,
    last_error: Option<String>,
}

/// Keeps the most recent preview. Clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct LatestPreview {
    slot: Arc<Mutex<PreviewSlot>>,
}

impl LatestPreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<PreviewFrame> {
        self.slot.lock().latest.clone()
    }

    /// Number of previews published so far.
    pub fn published(&self) -> u64 {
        self.slot.lock().published
    }

    pub fn last_error(&self) -> Option<String> {
        self.slot.lock().last_error.clone()
    }

    /// Write the latest preview to `path`. Returns `false` if there is
    /// nothing to save yet.
    pub fn save(&self, path: impl AsRef<Path>) -> StreamResult<bool> {
        match self.latest() {
            Some(preview) => preview.save(path).map(|_| true),
            None => Ok(false),
        }
    }
}

impl PreviewSurface for LatestPreview {
    fn publish(&self, preview: &PreviewFrame) {
        let mut slot = self.slot.lock();
        slot.latest = Some(preview.clone());
        slot.published += 1;
    }

    fn notify_error(&self, error: &StreamError) {
        self.slot.lock().last_error = Some(error.to_string());
    }
}

/// Whether the stream loop is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamState {
    Stopped,
    Running,
}

/// Cooperative stop flag whose waits wake up as soon as it is raised.
#[derive(Debug, Clone, Default)]
pub struct StopToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock() = true;
        cvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for up to `timeout`; returns `true` if the token was stopped.
    pub fn wait(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut stopped = flag.lock();
        while !*stopped {
            if cvar.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }
}

/// Loop counters, updated by the worker and readable from anywhere.
///
/// Every tick either sends a frame or is skipped, so
/// `ticks == frames_sent + skipped` once the loop has stopped.
#[derive(Debug, Default)]
pub struct TickStats {
    ticks: AtomicU64,
    frames_sent: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of [`TickStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TickSnapshot {
    pub ticks: u64,
    pub frames_sent: u64,
    pub skipped: u64,
}

impl TickStats {
    pub fn snapshot(&self) -> TickSnapshot {
        TickSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}

/// State reachable from both the controller and the worker.
struct Shared {
    sink: Mutex<Option<Box<dyn DeviceSink>>>,
    last_source: Mutex<Option<RawImage>>,
    config: SharedConfig,
    surface: Arc<dyn PreviewSurface>,
    stats: TickStats,
}

impl Shared {
    fn is_connected(&self) -> bool {
        self.sink.lock().is_some()
    }

    fn remember(&self, raw: &RawImage) {
        *self.last_source.lock() = Some(raw.clone());
    }

    /// Hand one frame to the sink. The lock is held for accept + commit only.
    fn send(&self, frame: &DeviceFrame) -> StreamResult<()> {
        let mut guard = self.sink.lock();
        let sink = guard.as_mut().ok_or(StreamError::NotConnected)?;
        sink.accept(frame)?;
        sink.commit()
    }
}

struct Worker {
    stop: StopToken,
    handle: JoinHandle<()>,
}

/// Controls streaming and one-shot sends to a device.
pub struct StreamController {
    shared: Arc<Shared>,
    settings: StreamConfig,
    factory: SourceFactory,
    processor: ImageProcessor,
    renderer: PreviewRenderer,
    worker: Option<Worker>,
}

impl StreamController {
    pub fn builder() -> StreamControllerBuilder {
        StreamControllerBuilder::new()
    }

    /// Controller with default settings, capturing the primary display.
    pub fn new() -> StreamResult<Self> {
        Self::builder().build()
    }

    /// Install a sink, replacing any previous one.
    pub fn connect(&self, sink: Box<dyn DeviceSink>) {
        let replaced = self.shared.sink.lock().replace(sink).is_some();
        info!(replaced, "device sink connected");
    }

    /// Remove the sink. A running loop goes idle until another is connected.
    pub fn disconnect(&self) -> Option<Box<dyn DeviceSink>> {
        let sink = self.shared.sink.lock().take();
        if sink.is_some() {
            info!("device sink disconnected");
        }
        sink
    }

    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    pub fn state(&self) -> StreamState {
        match &self.worker {
            Some(worker) if !worker.handle.is_finished() => StreamState::Running,
            _ => StreamState::Stopped,
        }
    }

    /// Live processing settings; clone the handle to edit them from elsewhere.
    pub fn config(&self) -> &SharedConfig {
        &self.shared.config
    }

    pub fn settings(&self) -> &StreamConfig {
        &self.settings
    }

    pub fn stats(&self) -> TickSnapshot {
        self.shared.stats.snapshot()
    }

    /// The most recent captured or loaded image.
    pub fn last_source(&self) -> Option<RawImage> {
        self.shared.last_source.lock().clone()
    }

    /// Start the stream loop.
    ///
    /// Fails with [`StreamError::NotConnected`] when no sink is installed.
    /// Calling it while already running does nothing.
    pub fn start(&mut self) -> StreamResult<()> {
        if self.state() == StreamState::Running {
            debug!("start ignored, stream already running");
            return Ok(());
        }
        // A worker that is finished but not yet joined gets reaped here.
        self.join_worker();
        if !self.is_connected() {
            return Err(StreamError::NotConnected);
        }

        let stop = StopToken::new();
        let shared = Arc::clone(&self.shared);
        let factory = Arc::clone(&self.factory);
        let settings = self.settings.clone();
        let token = stop.clone();
        let handle = thread::Builder::new()
            .name("pixoo-stream".into())
            .spawn(move || run_loop(&shared, &factory, &settings, &token))
            .map_err(|e| StreamError::Worker {
                reason: format!("failed to spawn stream thread: {e}"),
            })?;

        self.worker = Some(Worker { stop, handle });
        info!(fps = self.settings.fps, region = %self.settings.region, "streaming started");
        Ok(())
    }

    /// Stop the loop after its current tick and wait for it to exit.
    /// Does nothing when already stopped.
    pub fn stop(&mut self) {
        if self.join_worker() {
            info!(stats = ?self.stats(), "streaming stopped");
        }
    }

    fn join_worker(&mut self) -> bool {
        let Some(worker) = self.worker.take() else {
            return false;
        };
        worker.stop.stop();
        if worker.handle.join().is_err() {
            error!("stream worker panicked");
        }
        true
    }

    /// Decode `path` and make it the last source without sending anything.
    pub fn load_static(&self, path: impl AsRef<Path>) -> StreamResult<RawImage> {
        let raw = load_static(path)?;
        self.shared.remember(&raw);
        Ok(raw)
    }

    /// Load an image and push it to the device right away.
    ///
    /// Needs a connected sink and a stopped loop.
    pub fn show_static(&mut self, path: impl AsRef<Path>) -> StreamResult<PreviewFrame> {
        self.ensure_idle("show_static")?;
        let raw = self.load_static(path)?;
        self.send_one(&raw)
    }

    /// Capture one frame from the configured region and push it.
    ///
    /// Needs a connected sink and a stopped loop.
    pub fn capture_once(&mut self) -> StreamResult<PreviewFrame> {
        self.ensure_idle("capture_once")?;
        let mut source = (self.factory)();
        let raw = source.capture_frame()?;
        self.shared.remember(&raw);
        self.send_one(&raw)
    }

    /// Reprocess the last source with the current settings.
    ///
    /// The device frame is sent only while stopped; a running loop picks the
    /// change up on its next tick. The preview is published once the send (if
    /// any) succeeded, and failures go to the surface like any one-shot
    /// action. Returns `Ok(None)` when there is no last source yet.
    pub fn refresh(&mut self) -> StreamResult<Option<PreviewFrame>> {
        let Some(raw) = self.last_source() else {
            return Ok(None);
        };
        let send = self.state() == StreamState::Stopped && self.is_connected();
        let cfg = self.shared.config.snapshot();
        let result = reprocess(
            &self.shared,
            &mut self.processor,
            &mut self.renderer,
            &raw,
            &cfg,
            send,
        );
        if let Err(e) = &result {
            self.shared.surface.notify_error(e);
        }
        result.map(Some)
    }

    /// Edit the live processing settings, then [`refresh`](Self::refresh) so
    /// the last source is shown with them.
    pub fn update_config(
        &mut self,
        edit: impl FnOnce(&mut ProcessingConfig),
    ) -> StreamResult<Option<PreviewFrame>> {
        let cfg = self.shared.config.update(edit);
        debug!(?cfg, "processing settings changed");
        self.refresh()
    }

    fn ensure_idle(&self, action: &'static str) -> StreamResult<()> {
        if self.state() == StreamState::Running {
            return Err(StreamError::Busy { action });
        }
        if !self.is_connected() {
            return Err(StreamError::NotConnected);
        }
        Ok(())
    }

    fn send_one(&mut self, raw: &RawImage) -> StreamResult<PreviewFrame> {
        let cfg = self.shared.config.snapshot();
        let result = reprocess(
            &self.shared,
            &mut self.processor,
            &mut self.renderer,
            raw,
            &cfg,
            true,
        );
        if let Err(e) = &result {
            self.shared.surface.notify_error(e);
        }
        result
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Process `raw`, optionally send it, then render and publish the preview.
fn reprocess(
    shared: &Shared,
    processor: &mut ImageProcessor,
    renderer: &mut PreviewRenderer,
    raw: &RawImage,
    cfg: &ProcessingConfig,
    send: bool,
) -> StreamResult<PreviewFrame> {
    let frame = processor.process(raw, cfg)?;
    if send {
        shared.send(&frame)?;
    }
    let preview = renderer.render(&frame, cfg)?;
    shared.surface.publish(&preview);
    Ok(preview)
}

fn run_loop(shared: &Shared, factory: &SourceFactory, settings: &StreamConfig, stop: &StopToken) {
    let mut source = factory();
    let mut processor = ImageProcessor::new();
    let mut renderer = PreviewRenderer::new();
    let frame_time = settings.frame_duration();
    info!(source = %source.describe(), ?frame_time, "stream loop running");

    while !stop.is_stopped() {
        if !shared.is_connected() {
            if stop.wait(settings.idle_poll) {
                break;
            }
            continue;
        }

        let t0 = Instant::now();
        shared.stats.ticks.fetch_add(1, Ordering::Relaxed);
        match tick(shared, source.as_mut(), &mut processor) {
            Ok((frame, cfg)) => {
                shared.stats.frames_sent.fetch_add(1, Ordering::Relaxed);
                // The frame is already on the device; a preview failure is reported only
                match renderer.render(&frame, &cfg) {
                    Ok(preview) => shared.surface.publish(&preview),
                    Err(e) => report(shared, &e),
                }
            }
            Err(e) => {
                shared.stats.skipped.fetch_add(1, Ordering::Relaxed);
                report(shared, &e);
            }
        }

        // Pace to target FPS; a slow tick just runs late, no catch-up
        let elapsed = t0.elapsed();
        if elapsed < frame_time && stop.wait(frame_time - elapsed) {
            break;
        }
    }

    debug!(stats = ?shared.stats.snapshot(), "stream loop exited");
}

/// Capture, process and send one frame.
fn tick(
    shared: &Shared,
    source: &mut dyn CaptureSource,
    processor: &mut ImageProcessor,
) -> StreamResult<(DeviceFrame, ProcessingConfig)> {
    let raw = source.capture_frame()?;
    shared.remember(&raw);
    let cfg = shared.config.snapshot();
    let frame = processor.process(&raw, &cfg)?;
    shared.send(&frame)?;
    Ok((frame, cfg))
}

fn report(shared: &Shared, e: &StreamError) {
    if e.is_recoverable() {
        warn!(
            error = %e,
            category = e.category(),
            strategies = ?e.recovery_strategies(),
            "tick error"
        );
    } else {
        error!(error = %e, category = e.category(), "tick failed");
    }
    shared.surface.notify_error(e);
}

/// Builder for [`StreamController`].
pub struct StreamControllerBuilder {
    settings: StreamConfig,
    config: SharedConfig,
    surface: Arc<dyn PreviewSurface>,
    factory: Option<SourceFactory>,
}

impl Default for StreamControllerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamControllerBuilder {
    pub fn new() -> Self {
        Self {
            settings: StreamConfig::default(),
            config: SharedConfig::default(),
            surface: Arc::new(NullSurface),
            factory: None,
        }
    }

    pub fn with_settings(mut self, settings: StreamConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Initial processing settings.
    pub fn with_processing(mut self, processing: ProcessingConfig) -> Self {
        self.config = SharedConfig::new(processing);
        self
    }

    pub fn with_surface(mut self, surface: Arc<dyn PreviewSurface>) -> Self {
        self.surface = surface;
        self
    }

    /// Replace the screen with another source. `make` runs on the thread that
    /// will use the source: once per `start()` and once per `capture_once()`.
    pub fn with_capture_source<F, S>(mut self, make: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: CaptureSource + 'static,
    {
        self.factory = Some(Arc::new(move || Box::new(make()) as Box<dyn CaptureSource>));
        self
    }

    pub fn build(self) -> StreamResult<StreamController> {
        self.settings.validate()?;
        let factory = self.factory.unwrap_or_else(|| {
            let region = self.settings.region;
            Arc::new(move || Box::new(ScreenSource::new(region)) as Box<dyn CaptureSource>)
        });
        Ok(StreamController {
            shared: Arc::new(Shared {
                sink: Mutex::new(None),
                last_source: Mutex::new(None),
                config: self.config,
                surface: self.surface,
                stats: TickStats::default(),
            }),
            settings: self.settings,
            factory,
            processor: ImageProcessor::new(),
            renderer: PreviewRenderer::new(),
            worker: None,
        })
    }
}
