//! # Frame Types
//!
//! The three images that flow through one tick:
//!
//! ```text
//! RawImage ──process──▶ DeviceFrame (64×64 RGB) ──render──▶ PreviewFrame (512×512 RGB)
//! ```
//!
//! `RawImage` shares its pixel buffer behind an `Arc`, so caching it as the
//! last source or handing it to another thread never copies pixels.
//! `DeviceFrame` and `PreviewFrame` can only be built with the right
//! dimensions.

use std::path::Path;
use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use pixel_scale::{CropBox, Size};

use crate::error::{StreamError, StreamResult};

/// Edge length of the device pixel grid.
pub const DEVICE_SIZE: u32 = 64;

/// Edge length of the magnified preview.
pub const PREVIEW_SIZE: u32 = 512;

/// Byte layout of a raw pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// Blue, green, red, padding/alpha; what screen capturers deliver
    Bgra8,
    /// Red, green, blue, alpha
    Rgba8,
    /// Red, green, blue
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }
}

/// Captured or decoded pixels, immutable once created.
#[derive(Debug, Clone)]
pub struct RawImage {
    data: Arc<Vec<u8>>,
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

impl RawImage {
    /// Wrap a buffer whose rows are `stride` bytes apart.
    ///
    /// Nothing is checked here; capture backends hand over whatever they got
    /// and [`RawImage::validate`] runs before any processing.
    pub fn new(data: Vec<u8>, width: u32, height: u32, stride: usize, format: PixelFormat) -> Self {
        Self {
            data: Arc::new(data),
            width,
            height,
            stride,
            format,
        }
    }

    /// Wrap a tightly packed buffer.
    pub fn packed(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        let stride = width as usize * format.bytes_per_pixel();
        Self::new(data, width, height, stride, format)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> Size {
        Size {
            w: self.width,
            h: self.height,
        }
    }

    fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Check that the buffer really holds `width × height` pixels.
    pub fn validate(&self) -> StreamResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(StreamError::processing(
                "validate",
                format!("image has zero area ({}x{})", self.width, self.height),
            ));
        }
        let row = self.row_bytes();
        if self.stride < row {
            return Err(StreamError::processing(
                "validate",
                format!("stride {} shorter than row of {row} bytes", self.stride),
            ));
        }
        let need = self.stride * (self.height as usize - 1) + row;
        if self.data.len() < need {
            return Err(StreamError::processing(
                "validate",
                format!("buffer holds {} bytes, need {need}", self.data.len()),
            ));
        }
        Ok(())
    }

    /// Copy out a sub-rectangle as a new, tightly packed image.
    pub fn crop(&self, crop: CropBox) -> StreamResult<RawImage> {
        self.validate()?;
        if crop.w == 0 || crop.h == 0 {
            return Err(StreamError::processing("crop", "zero-area crop box"));
        }
        if !crop.fits_within(self.size()) {
            return Err(StreamError::processing(
                "crop",
                format!(
                    "box {}x{} at ({}, {}) exceeds {}x{}",
                    crop.w, crop.h, crop.left, crop.top, self.width, self.height
                ),
            ));
        }
        let bpp = self.format.bytes_per_pixel();
        let row = crop.w as usize * bpp;
        let mut out = Vec::with_capacity(row * crop.h as usize);
        for y in crop.top..crop.top + crop.h {
            let start = y as usize * self.stride + crop.left as usize * bpp;
            out.extend_from_slice(&self.data[start..start + row]);
        }
        Ok(RawImage::packed(out, crop.w, crop.h, self.format))
    }

    /// Normalise into tightly packed 4-byte pixels with red first.
    ///
    /// Alpha is forced to 255; the device has no transparency.
    pub fn to_rgbx(&self) -> StreamResult<Vec<u8>> {
        self.validate()?;
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        let row = self.row_bytes();
        for y in 0..self.height as usize {
            let line = &self.data[y * self.stride..y * self.stride + row];
            match self.format {
                PixelFormat::Bgra8 => {
                    for px in line.chunks_exact(4) {
                        out.extend_from_slice(&[px[2], px[1], px[0], 255]);
                    }
                }
                PixelFormat::Rgba8 => {
                    for px in line.chunks_exact(4) {
                        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
                    }
                }
                PixelFormat::Rgb8 => {
                    for px in line.chunks_exact(3) {
                        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
                    }
                }
            }
        }
        Ok(out)
    }
}

impl From<DynamicImage> for RawImage {
    fn from(image: DynamicImage) -> Self {
        if image.color().has_alpha() {
            let rgba = image.into_rgba8();
            let (w, h) = rgba.dimensions();
            RawImage::packed(rgba.into_raw(), w, h, PixelFormat::Rgba8)
        } else {
            let rgb = image.into_rgb8();
            let (w, h) = rgb.dimensions();
            RawImage::packed(rgb.into_raw(), w, h, PixelFormat::Rgb8)
        }
    }
}

/// Drop the fourth byte of every pixel.
pub(crate) fn rgbx_to_rgb(rgbx: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgbx.len() / 4 * 3);
    for px in rgbx.chunks_exact(4) {
        out.extend_from_slice(&px[..3]);
    }
    out
}

/// Add an opaque fourth byte to every pixel.
pub(crate) fn rgb_to_rgbx(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    out
}

/// The image handed to the device: always `DEVICE_SIZE`² RGB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFrame {
    image: RgbImage,
}

impl DeviceFrame {
    pub fn new(image: RgbImage) -> StreamResult<Self> {
        check_square(&image, DEVICE_SIZE, "device frame")?;
        Ok(Self { image })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Row-major RGB bytes, `DEVICE_SIZE * DEVICE_SIZE * 3` long.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }
}

/// Magnified rendering of a [`DeviceFrame`] for on-screen display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    image: RgbImage,
}

impl PreviewFrame {
    pub fn new(image: RgbImage) -> StreamResult<Self> {
        check_square(&image, PREVIEW_SIZE, "preview frame")?;
        Ok(Self { image })
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.image.get_pixel(x, y).0
    }

    /// Save as an image file; the format follows the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> StreamResult<()> {
        let path = path.as_ref();
        self.image
            .save(path)
            .map_err(|e| StreamError::load(path, format!("could not write preview: {e}")))
    }
}

fn check_square(image: &RgbImage, edge: u32, what: &'static str) -> StreamResult<()> {
    if image.dimensions() != (edge, edge) {
        let (w, h) = image.dimensions();
        return Err(StreamError::processing(
            what,
            format!("expected {edge}x{edge}, got {w}x{h}"),
        ));
    }
    Ok(())
}
