//! # Pixoo Mirror
//!
//! Mirror a screen, or show a still image, on a 64×64 Divoom Pixoo LED panel,
//! with a magnified preview of exactly what the panel shows.
//!
//! ## Architecture
//!
//! - `capture`: screen capture (scrap) and static image sources
//! - `processing`: crop, resize and filter down to a device frame; preview rendering
//! - `sink`: device sinks (Pixoo HTTP, in-memory)
//! - `session`: the stream controller, its worker loop and one-shot actions
//! - `config`: loop settings and the live processing settings cell
//! - `core`: frame types and fixed resolutions
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use pixoo_mirror::{PixooSink, StreamController};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut controller = StreamController::new()?;
//! controller.connect(Box::new(PixooSink::connect(
//!     "192.168.1.215",
//!     Duration::from_secs(2),
//! )?));
//! controller.start()?;
//! std::thread::sleep(Duration::from_secs(10));
//! controller.stop();
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod core;
pub mod error;
pub mod logger;
pub mod processing;
pub mod session;
pub mod sink;

pub use capture::{
    CaptureRegion, CaptureSource, DisplayInfo, ScreenSource, StaticSource, list_displays,
    load_static,
};
pub use config::{ProcessingConfig, SharedConfig, StreamConfig};
pub use core::{DEVICE_SIZE, DeviceFrame, PREVIEW_SIZE, PixelFormat, PreviewFrame, RawImage};
pub use error::{Recoverable, RecoveryStrategy, StreamError, StreamResult};
pub use processing::{Filter, ImageProcessor, PreviewRenderer};
pub use session::{
    LatestPreview, NullSurface, PreviewSurface, StopToken, StreamController,
    StreamControllerBuilder, StreamState, TickSnapshot,
};
pub use sink::{DeviceSink, MemorySink, PixooSink};

/// Re-export the resize kernel selector so callers need not depend on `pixel-scale`
pub use pixel_scale::ResizeMethod;
