//! # Frame Processing Pipeline
//!
//! Turns one [`RawImage`] into one [`DeviceFrame`]. The chain is fixed:
//!
//! 1. **Crop**: optional centered square, edge `min(width, height)`
//! 2. **Resize**: to `DEVICE_SIZE`² with the configured [`ResizeMethod`]
//! 3. **Filter**: optional single named kernel
//!
//! The processor owns scratch buffers that it reuses between frames, but its
//! output depends only on the image and the configuration snapshot it is given.
//!
//! [`ResizeMethod`]: pixel_scale::ResizeMethod

use fast_image_resize as fir;
use image::RgbImage;
use pixel_scale::{Size, Staging, build_plan, scale_u8x4};
use tracing::trace;

use crate::config::ProcessingConfig;
use crate::core::frame::{DEVICE_SIZE, DeviceFrame, PixelFormat, RawImage, rgbx_to_rgb};
use crate::error::{StreamError, StreamResult};

/// Stateless-in-effect crop/resize/filter chain.
pub struct ImageProcessor {
    resizer: fir::Resizer,
    staging: Staging,
    output_buffer: Vec<u8>,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageProcessor {
    pub fn new() -> Self {
        Self {
            resizer: fir::Resizer::new(),
            staging: Staging::default(),
            output_buffer: vec![0u8; (DEVICE_SIZE * DEVICE_SIZE * 4) as usize],
        }
    }

    /// Run the full chain on `raw` with the settings in `cfg`.
    ///
    /// Fails with [`StreamError::Processing`] for malformed or empty input; no
    /// partial frame is ever returned.
    pub fn process(&mut self, raw: &RawImage, cfg: &ProcessingConfig) -> StreamResult<DeviceFrame> {
        raw.validate()?;

        let plan = build_plan(
            raw.size(),
            Size {
                w: DEVICE_SIZE,
                h: DEVICE_SIZE,
            },
            cfg.crop_to_square,
        );
        if plan.source_region().is_empty() {
            return Err(StreamError::processing("crop", "zero-area crop"));
        }
        trace!(
            input = ?plan.input,
            crop = ?plan.crop,
            method = %cfg.resize_method,
            "processing frame"
        );

        // Four-byte layouts go straight to the resizer; the channel order is
        // fixed up on the 64x64 result. Three-byte images are widened first.
        let widened;
        let (src, stride) = match raw.format() {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => (raw.data(), raw.stride()),
            PixelFormat::Rgb8 => {
                widened = raw.to_rgbx()?;
                (widened.as_slice(), raw.width() as usize * 4)
            }
        };

        scale_u8x4(
            &mut self.resizer,
            src,
            Some(stride),
            &plan,
            cfg.resize_method,
            &mut self.output_buffer,
            Some(&mut self.staging),
        )?;

        if raw.format() == PixelFormat::Bgra8 {
            for px in self.output_buffer.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
        }

        let rgb = RgbImage::from_raw(DEVICE_SIZE, DEVICE_SIZE, rgbx_to_rgb(&self.output_buffer))
            .ok_or_else(|| StreamError::processing("resize", "output buffer size mismatch"))?;
        let filtered = cfg.filter.apply(&rgb);
        DeviceFrame::new(filtered)
    }
}
