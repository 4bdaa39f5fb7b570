//! Static images: decode a file once and replay it.

use std::path::Path;

use image::ImageError;
use tracing::debug;

use crate::core::frame::RawImage;
use crate::error::{StreamError, StreamResult};

use super::CaptureSource;

/// Decode `path` into a [`RawImage`].
///
/// The format is guessed from the file contents and extension. Missing files,
/// unsupported formats and corrupt data all come back as
/// [`StreamError::Load`] naming the path.
pub fn load_static(path: impl AsRef<Path>) -> StreamResult<RawImage> {
    let path = path.as_ref();
    let image = image::open(path).map_err(|e| match e {
        ImageError::IoError(io) => StreamError::load(path, io.to_string()),
        ImageError::Unsupported(u) => StreamError::load(path, format!("unsupported format: {u}")),
        other => StreamError::load(path, format!("could not decode: {other}")),
    })?;
    debug!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "static image loaded"
    );
    Ok(RawImage::from(image))
}

/// Source that hands out the same image on every tick.
#[derive(Debug, Clone)]
pub struct StaticSource {
    image: RawImage,
}

impl StaticSource {
    pub fn new(image: RawImage) -> Self {
        Self { image }
    }
}

impl CaptureSource for StaticSource {
    fn capture_frame(&mut self) -> StreamResult<RawImage> {
        Ok(self.image.clone())
    }

    fn describe(&self) -> String {
        format!("static image {}x{}", self.image.width(), self.image.height())
    }
}
