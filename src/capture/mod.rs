//! # Capture Module
//!
//! Frame sources for the stream loop: the screen (through scrap) and static
//! images decoded from disk.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::core::frame::RawImage;
use crate::error::{StreamError, StreamResult};

pub mod scrap;
pub mod static_image;

pub use self::scrap::{ScreenSource, list_displays};
pub use static_image::{StaticSource, load_static};

/// Abstract interface for frame capture sources.
///
/// Sources live on the thread that created them; screen capturers are not
/// `Send` on every platform, so the stream loop builds its source through a
/// [`SourceFactory`] on the worker thread.
pub trait CaptureSource {
    /// Produce the next frame.
    fn capture_frame(&mut self) -> StreamResult<RawImage>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String {
        "capture source".to_string()
    }
}

/// Builds a fresh [`CaptureSource`] on whichever thread calls it.
pub type SourceFactory = Arc<dyn Fn() -> Box<dyn CaptureSource> + Send + Sync>;

/// Which part of which display to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureRegion {
    /// The whole primary display
    #[default]
    Primary,
    /// The whole display at this index (see [`list_displays`])
    Display(usize),
    /// The centered `min(w, h)` square of the display at this index
    CenteredSquare(usize),
}

impl fmt::Display for CaptureRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureRegion::Primary => write!(f, "primary"),
            CaptureRegion::Display(i) => write!(f, "display:{i}"),
            CaptureRegion::CenteredSquare(i) => write!(f, "square:{i}"),
        }
    }
}

impl FromStr for CaptureRegion {
    type Err = StreamError;

    /// Accepts `primary`, `display:N` and `square:N`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        if s == "primary" {
            return Ok(CaptureRegion::Primary);
        }
        let (kind, index) = s.split_once(':').ok_or_else(|| {
            StreamError::config("region", format!("'{s}' is not primary, display:N or square:N"))
        })?;
        let index: usize = index
            .parse()
            .map_err(|_| StreamError::config("region", format!("invalid display index '{index}'")))?;
        match kind {
            "display" => Ok(CaptureRegion::Display(index)),
            "square" => Ok(CaptureRegion::CenteredSquare(index)),
            other => Err(StreamError::config(
                "region",
                format!("unknown region kind '{other}'"),
            )),
        }
    }
}

/// A capturable display as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DisplayInfo {
    pub index: usize,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for DisplayInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Display {}: {}x{}",
            self.index, self.width, self.height
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_round_trips_through_text() {
        for region in [
            CaptureRegion::Primary,
            CaptureRegion::Display(2),
            CaptureRegion::CenteredSquare(0),
        ] {
            assert_eq!(region.to_string().parse::<CaptureRegion>().unwrap(), region);
        }
    }

    #[test]
    fn region_parsing_is_forgiving_about_case() {
        assert_eq!(
            " Square:1 ".parse::<CaptureRegion>().unwrap(),
            CaptureRegion::CenteredSquare(1)
        );
    }

    #[test]
    fn bad_regions_are_config_errors() {
        for text in ["", "display", "display:x", "window:1"] {
            let err = text.parse::<CaptureRegion>().unwrap_err();
            assert_eq!(err.category(), "config", "{text}");
        }
    }
}
