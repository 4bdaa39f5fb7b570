//! Preview rendering: magnify the device frame for display and optionally
//! overlay a grid that outlines every device pixel.

use fast_image_resize as fir;
use image::{Rgb, RgbImage};
use pixel_scale::{Size, build_plan, scale_u8x4};

use crate::config::ProcessingConfig;
use crate::core::frame::{
    DEVICE_SIZE, DeviceFrame, PREVIEW_SIZE, PreviewFrame, rgb_to_rgbx, rgbx_to_rgb,
};
use crate::error::{StreamError, StreamResult};

/// Preview pixels per device pixel.
pub const GRID_SPACING: u32 = PREVIEW_SIZE / DEVICE_SIZE;

/// Colour of the grid lines.
pub const GRID_COLOR: [u8; 3] = [200, 200, 200];

/// Whether a preview pixel lies on a grid line.
pub fn is_grid_pixel(x: u32, y: u32) -> bool {
    x % GRID_SPACING == 0 || y % GRID_SPACING == 0
}

/// Upscales device frames to `PREVIEW_SIZE`² using the same resize method that
/// produced them.
pub struct PreviewRenderer {
    resizer: fir::Resizer,
    output_buffer: Vec<u8>,
}

impl Default for PreviewRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewRenderer {
    pub fn new() -> Self {
        Self {
            resizer: fir::Resizer::new(),
            output_buffer: vec![0u8; (PREVIEW_SIZE * PREVIEW_SIZE * 4) as usize],
        }
    }

    /// Render `frame` for display. The frame itself is never touched; the grid
    /// is drawn on the freshly scaled copy.
    pub fn render(&mut self, frame: &DeviceFrame, cfg: &ProcessingConfig) -> StreamResult<PreviewFrame> {
        let src = rgb_to_rgbx(frame.as_bytes());
        let plan = build_plan(
            Size {
                w: DEVICE_SIZE,
                h: DEVICE_SIZE,
            },
            Size {
                w: PREVIEW_SIZE,
                h: PREVIEW_SIZE,
            },
            false,
        );
        scale_u8x4(
            &mut self.resizer,
            &src,
            None,
            &plan,
            cfg.resize_method,
            &mut self.output_buffer,
            None,
        )?;

        let mut image = RgbImage::from_raw(PREVIEW_SIZE, PREVIEW_SIZE, rgbx_to_rgb(&self.output_buffer))
            .ok_or_else(|| StreamError::processing("preview", "output buffer size mismatch"))?;
        if cfg.show_grid {
            draw_grid(&mut image);
        }
        PreviewFrame::new(image)
    }
}

fn draw_grid(image: &mut RgbImage) {
    let (w, h) = image.dimensions();
    let color = Rgb(GRID_COLOR);
    for x in (0..w).step_by(GRID_SPACING as usize) {
        for y in 0..h {
            image.put_pixel(x, y, color);
        }
    }
    for y in (0..h).step_by(GRID_SPACING as usize) {
        for x in 0..w {
            image.put_pixel(x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixel_scale::ResizeMethod;

    fn checker() -> DeviceFrame {
        let img = RgbImage::from_fn(DEVICE_SIZE, DEVICE_SIZE, |x, y| {
            if (x + y) % 2 == 0 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        DeviceFrame::new(img).unwrap()
    }

    #[test]
    fn nearest_preview_blows_up_each_device_pixel() {
        let cfg = ProcessingConfig {
            show_grid: false,
            ..ProcessingConfig::default()
        };
        let preview = PreviewRenderer::new().render(&checker(), &cfg).unwrap();
        assert_eq!(preview.pixel(0, 0), [255, 0, 0]);
        assert_eq!(preview.pixel(7, 7), [255, 0, 0]);
        assert_eq!(preview.pixel(8, 0), [0, 0, 255]);
        assert_eq!(preview.pixel(511, 511), [255, 0, 0]);
    }

    #[test]
    fn grid_lines_sit_on_device_pixel_edges() {
        let cfg = ProcessingConfig {
            show_grid: true,
            ..ProcessingConfig::default()
        };
        let preview = PreviewRenderer::new().render(&checker(), &cfg).unwrap();
        assert_eq!(preview.pixel(0, 5), GRID_COLOR);
        assert_eq!(preview.pixel(504, 300), GRID_COLOR);
        assert_eq!(preview.pixel(3, 16), GRID_COLOR);
        assert_eq!(preview.pixel(1, 1), [255, 0, 0]);
    }

    #[test]
    fn rendering_leaves_the_device_frame_alone() {
        let frame = checker();
        let before = frame.clone();
        let mut renderer = PreviewRenderer::new();
        for method in ResizeMethod::ALL {
            let cfg = ProcessingConfig {
                resize_method: method,
                show_grid: true,
                ..ProcessingConfig::default()
            };
            let a = renderer.render(&frame, &cfg).unwrap();
            let b = renderer.render(&frame, &cfg).unwrap();
            assert_eq!(a, b, "{method} preview is not idempotent");
        }
        assert_eq!(frame, before);
    }
}
