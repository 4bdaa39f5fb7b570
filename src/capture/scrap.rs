//! # Scrap Capture Module
//!
//! Screen capture through the `scrap` library.
//!
//! ## Platform Support
//!
//! | Platform | Backend | Notes |
//! |----------|---------|-------|
//! | Windows | DXGI desktop duplication | |
//! | macOS | CoreGraphics display stream | needs the screen-recording permission |
//! | Linux X11 | XShm | Wayland sessions are not supported by scrap |
//!
//! The capturer is opened lazily on the thread that first asks for a frame
//! and dropped again after any hard error, so the next tick starts from a
//! fresh handle. Frames arrive as BGRA with rows that may carry padding; the
//! row stride is taken from the buffer length.
//!
//! Building without the `screen-capture` feature keeps the type around but
//! every capture reports [`StreamError::Capture`].

#[cfg(feature = "screen-capture")]
use std::io::ErrorKind;
#[cfg(feature = "screen-capture")]
use std::thread;
#[cfg(feature = "screen-capture")]
use std::time::Duration;

#[cfg(feature = "screen-capture")]
use pixel_scale::center_square;
#[cfg(feature = "screen-capture")]
use scrap::{Capturer, Display};
#[cfg(feature = "screen-capture")]
use tracing::{debug, info};

#[cfg(feature = "screen-capture")]
use crate::core::frame::PixelFormat;
use crate::core::frame::RawImage;
use crate::error::{StreamError, StreamResult};

use super::{CaptureRegion, CaptureSource, DisplayInfo};

/// Nap between `WouldBlock` polls while the compositor has no new frame.
#[cfg(feature = "screen-capture")]
const WOULD_BLOCK_NAP: Duration = Duration::from_millis(2);

/// `WouldBlock` polls before a tick gives up on the screen.
#[cfg(feature = "screen-capture")]
const MAX_WOULD_BLOCK_POLLS: u32 = 50;

#[cfg(feature = "screen-capture")]
struct OpenCapturer {
    capturer: Capturer,
    width: usize,
    height: usize,
}

/// Captures one display, or its centered square, on every call.
pub struct ScreenSource {
    region: CaptureRegion,
    #[cfg(feature = "screen-capture")]
    open: Option<OpenCapturer>,
}

impl ScreenSource {
    pub fn new(region: CaptureRegion) -> Self {
        Self {
            region,
            #[cfg(feature = "screen-capture")]
            open: None,
        }
    }

    pub fn region(&self) -> CaptureRegion {
        self.region
    }
}

#[cfg(feature = "screen-capture")]
impl ScreenSource {
    fn open(&mut self) -> StreamResult<&mut OpenCapturer> {
        if self.open.is_none() {
            let display = select_display(self.region)?;
            let (width, height) = (display.width(), display.height());
            let capturer = Capturer::new(display)
                .map_err(|e| StreamError::capture(format!("cannot create capturer: {e}")))?;
            info!(region = %self.region, width, height, "screen capturer opened");
            self.open = Some(OpenCapturer {
                capturer,
                width,
                height,
            });
        }
        self.open
            .as_mut()
            .ok_or_else(|| StreamError::capture("capturer unavailable"))
    }
}

#[cfg(feature = "screen-capture")]
impl CaptureSource for ScreenSource {
    fn capture_frame(&mut self) -> StreamResult<RawImage> {
        let grabbed = self.open().and_then(grab);
        let raw = match grabbed {
            Ok(raw) => raw,
            Err(e) => {
                debug!(error = %e, "dropping screen capturer");
                self.open = None;
                return Err(e);
            }
        };
        match self.region {
            CaptureRegion::CenteredSquare(_) => raw.crop(center_square(raw.size())),
            CaptureRegion::Primary | CaptureRegion::Display(_) => Ok(raw),
        }
    }

    fn describe(&self) -> String {
        format!("screen ({})", self.region)
    }
}

#[cfg(not(feature = "screen-capture"))]
impl CaptureSource for ScreenSource {
    fn capture_frame(&mut self) -> StreamResult<RawImage> {
        Err(StreamError::capture(
            "built without the `screen-capture` feature",
        ))
    }

    fn describe(&self) -> String {
        format!("screen ({}, unavailable)", self.region)
    }
}

#[cfg(feature = "screen-capture")]
fn grab(open: &mut OpenCapturer) -> StreamResult<RawImage> {
    for _ in 0..MAX_WOULD_BLOCK_POLLS {
        match open.capturer.frame() {
            Ok(frame) => {
                if open.height == 0 || frame.len() < open.width * open.height * 4 {
                    return Err(StreamError::capture(format!(
                        "unexpected frame size from scrap: got {} bytes for {}x{}",
                        frame.len(),
                        open.width,
                        open.height
                    )));
                }
                let stride = frame.len() / open.height;
                return Ok(RawImage::new(
                    frame.to_vec(),
                    open.width as u32,
                    open.height as u32,
                    stride,
                    PixelFormat::Bgra8,
                ));
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                // no frame ready yet, small nap
                thread::sleep(WOULD_BLOCK_NAP);
            }
            Err(e) => return Err(StreamError::capture(format!("scrap frame error: {e}"))),
        }
    }
    Err(StreamError::capture("no frame became ready in time"))
}

#[cfg(feature = "screen-capture")]
fn select_display(region: CaptureRegion) -> StreamResult<Display> {
    match region {
        CaptureRegion::Primary => Display::primary()
            .map_err(|e| StreamError::capture(format!("no primary display: {e}"))),
        CaptureRegion::Display(index) | CaptureRegion::CenteredSquare(index) => {
            let mut displays = Display::all()
                .map_err(|e| StreamError::capture(format!("cannot enumerate displays: {e}")))?;
            let count = displays.len();
            if index >= count {
                return Err(StreamError::capture(format!(
                    "display {index} does not exist ({count} found)"
                )));
            }
            Ok(displays.swap_remove(index))
        }
    }
}

/// Enumerate the displays scrap can capture, in the order `display:N`
/// indexes them.
#[cfg(feature = "screen-capture")]
pub fn list_displays() -> StreamResult<Vec<DisplayInfo>> {
    let displays = Display::all()
        .map_err(|e| StreamError::capture(format!("cannot enumerate displays: {e}")))?;
    Ok(displays
        .iter()
        .enumerate()
        .map(|(index, d)| DisplayInfo {
            index,
            width: d.width() as u32,
            height: d.height() as u32,
        })
        .collect())
}

#[cfg(not(feature = "screen-capture"))]
pub fn list_displays() -> StreamResult<Vec<DisplayInfo>> {
    Err(StreamError::capture(
        "built without the `screen-capture` feature",
    ))
}
