// SPDX-License-Identifier: MIT
// CPU scaler built on fast_image_resize (SIMD-accelerated).
// 4-byte pixels in (BGRA/RGBA/RGBX, order is irrelevant) → 4-byte pixels out,
// direct write into caller-provided dst buffer. Alpha is never premultiplied.

use fast_image_resize as fir;
use fir::images::{TypedImage, TypedImageRef};
use fir::pixels::U8x4;
use fir::{ResizeOptions, Resizer};
use thiserror::Error;

use crate::plan::{ResizeMethod, ScalePlan};

#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("source or target has zero area")]
    EmptyImage,
    #[error("crop box {left},{top} {w}x{h} exceeds source {src_w}x{src_h}")]
    CropOutOfBounds {
        left: u32,
        top: u32,
        w: u32,
        h: u32,
        src_w: u32,
        src_h: u32,
    },
    #[error("row stride {stride} is shorter than a {row} byte row")]
    StrideTooSmall { stride: usize, row: usize },
    #[error("source buffer holds {got} bytes, need {need}")]
    SourceTooSmall { got: usize, need: usize },
    #[error("output buffer too small")]
    BufferTooSmall,
    #[error("stride mismatch but no staging buffer provided")]
    StrideMismatchAndNoStaging,
    #[error("fast image resize error: {0}")]
    Fir(#[from] fir::ResizeError),
    #[error("image buffer error: {0}")]
    ImageBuf(#[from] fir::ImageBufferError),
}

/// Pre-allocated scratch to compact strided input to tightly packed rows (only if needed).
#[derive(Debug, Default)]
pub struct Staging {
    pub(crate) buf: Vec<u8>,
}

impl Staging {
    pub fn ensure_len(&mut self, len: usize) {
        if self.buf.len() < len {
            self.buf.resize(len, 0);
        }
    }
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }
}

/// Main scaling entry point.
///
/// `src_stride_bytes`: bytes per row of source. If `Some(stride) != width*4`, rows are
/// compacted into `staging` first. `dst` must hold at least `plan.out.w * plan.out.h * 4`
/// bytes. The crop in `plan` (if any) is applied by the resizer itself.
pub fn scale_u8x4(
    resizer: &mut Resizer,
    src: &[u8],
    src_stride_bytes: Option<usize>,
    plan: &ScalePlan,
    method: ResizeMethod,
    dst: &mut [u8],
    mut staging: Option<&mut Staging>,
) -> Result<(), ScaleError> {
    let input = plan.input;
    if input.is_empty() || plan.out.is_empty() || plan.source_region().is_empty() {
        return Err(ScaleError::EmptyImage);
    }
    if let Some(crop) = plan.crop {
        if !crop.fits_within(input) {
            return Err(ScaleError::CropOutOfBounds {
                left: crop.left,
                top: crop.top,
                w: crop.w,
                h: crop.h,
                src_w: input.w,
                src_h: input.h,
            });
        }
    }

    let dst_len = (plan.out.w as usize) * (plan.out.h as usize) * 4;
    if dst.len() < dst_len {
        return Err(ScaleError::BufferTooSmall);
    }

    // --- Build source view (tightly packed) ---
    let tight_row_bytes = (input.w as usize) * 4;
    let rows = input.h as usize;
    let pitch = src_stride_bytes.unwrap_or(tight_row_bytes);
    if pitch < tight_row_bytes {
        return Err(ScaleError::StrideTooSmall {
            stride: pitch,
            row: tight_row_bytes,
        });
    }
    let need = pitch * (rows - 1) + tight_row_bytes;
    if src.len() < need {
        return Err(ScaleError::SourceTooSmall {
            got: src.len(),
            need,
        });
    }

    let src_view = if pitch == tight_row_bytes {
        TypedImageRef::<U8x4>::from_buffer(input.w, input.h, &src[..tight_row_bytes * rows])?
    } else {
        let st = staging
            .as_deref_mut()
            .ok_or(ScaleError::StrideMismatchAndNoStaging)?;
        st.ensure_len(tight_row_bytes * rows);
        compact_rows(src, pitch, &mut st.buf, tight_row_bytes, rows);
        TypedImageRef::<U8x4>::from_buffer(input.w, input.h, &st.as_slice()[..tight_row_bytes * rows])?
    };

    let mut dst_image = TypedImage::<U8x4>::from_buffer(plan.out.w, plan.out.h, &mut dst[..dst_len])?;

    let mut opts = ResizeOptions::new()
        .resize_alg(method.to_alg())
        .use_alpha(false);
    if let Some(crop) = plan.crop {
        opts = opts.crop(
            crop.left as f64,
            crop.top as f64,
            crop.w as f64,
            crop.h as f64,
        );
    }

    resizer.resize_typed(&src_view, &mut dst_image, &opts)?;
    Ok(())
}

#[inline]
fn compact_rows(src: &[u8], src_pitch: usize, dst: &mut [u8], row_bytes: usize, rows: usize) {
    for r in 0..rows {
        let s = &src[r * src_pitch..r * src_pitch + row_bytes];
        let d = &mut dst[r * row_bytes..(r + 1) * row_bytes];
        d.copy_from_slice(s);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Size, build_plan};

    const RED: [u8; 4] = [255, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 255, 255];

    fn solid(w: u32, h: u32, px: [u8; 4]) -> Vec<u8> {
        px.repeat((w * h) as usize)
    }

    #[test]
    fn nearest_upscale_replicates_pixels() {
        // 2x1: red, blue
        let src = [RED, BLUE].concat();
        let plan = build_plan(Size { w: 2, h: 1 }, Size { w: 4, h: 2 }, false);
        let mut out = vec![0u8; 4 * 2 * 4];
        let mut resizer = Resizer::new();
        scale_u8x4(&mut resizer, &src, None, &plan, ResizeMethod::Nearest, &mut out, None).unwrap();
        let px: Vec<&[u8]> = out.chunks_exact(4).collect();
        assert_eq!(px[0], RED);
        assert_eq!(px[1], RED);
        assert_eq!(px[2], BLUE);
        assert_eq!(px[3], BLUE);
        assert_eq!(px[4], RED);
        assert_eq!(px[7], BLUE);
    }

    #[test]
    fn crop_discards_side_bands() {
        // 4x2: columns 0 and 3 red, columns 1 and 2 blue
        let row = [RED, BLUE, BLUE, RED].concat();
        let src = [row.clone(), row].concat();
        let plan = build_plan(Size { w: 4, h: 2 }, Size { w: 8, h: 8 }, true);
        let mut out = vec![0u8; 8 * 8 * 4];
        let mut resizer = Resizer::new();
        scale_u8x4(&mut resizer, &src, None, &plan, ResizeMethod::Nearest, &mut out, None).unwrap();
        assert!(out.chunks_exact(4).all(|p| p == BLUE));
    }

    #[test]
    fn uniform_image_stays_uniform_for_every_method() {
        let src = solid(37, 19, [10, 20, 30, 255]);
        let plan = build_plan(Size { w: 37, h: 19 }, Size { w: 16, h: 16 }, false);
        let mut resizer = Resizer::new();
        for method in ResizeMethod::ALL {
            let mut out = vec![0u8; 16 * 16 * 4];
            scale_u8x4(&mut resizer, &src, None, &plan, method, &mut out, None).unwrap();
            assert!(
                out.chunks_exact(4).all(|p| p[..3] == [10, 20, 30]),
                "{method} changed a flat colour"
            );
        }
    }

    #[test]
    fn padded_rows_go_through_staging() {
        let w = 3u32;
        let h = 2u32;
        let pitch = 16usize; // 12 bytes of pixels + 4 bytes padding
        let mut src = vec![0xEEu8; pitch * h as usize];
        for r in 0..h as usize {
            for c in 0..w as usize {
                src[r * pitch + c * 4..r * pitch + c * 4 + 4].copy_from_slice(&BLUE);
            }
        }
        let plan = build_plan(Size { w, h }, Size { w: 3, h: 2 }, false);
        let mut out = vec![0u8; 3 * 2 * 4];
        let mut resizer = Resizer::new();

        let err = scale_u8x4(&mut resizer, &src, Some(pitch), &plan, ResizeMethod::Nearest, &mut out, None);
        assert!(matches!(err, Err(ScaleError::StrideMismatchAndNoStaging)));

        let mut staging = Staging::default();
        scale_u8x4(
            &mut resizer,
            &src,
            Some(pitch),
            &plan,
            ResizeMethod::Nearest,
            &mut out,
            Some(&mut staging),
        )
        .unwrap();
        assert!(out.chunks_exact(4).all(|p| p == BLUE));
    }

    #[test]
    fn rejects_degenerate_input() {
        let plan = build_plan(Size { w: 0, h: 4 }, Size { w: 4, h: 4 }, false);
        let mut out = vec![0u8; 64];
        let mut resizer = Resizer::new();
        let err = scale_u8x4(&mut resizer, &[], None, &plan, ResizeMethod::Nearest, &mut out, None);
        assert!(matches!(err, Err(ScaleError::EmptyImage)));
    }

    #[test]
    fn rejects_truncated_source() {
        let src = vec![0u8; 10];
        let plan = build_plan(Size { w: 4, h: 4 }, Size { w: 4, h: 4 }, false);
        let mut out = vec![0u8; 64];
        let mut resizer = Resizer::new();
        let err = scale_u8x4(&mut resizer, &src, None, &plan, ResizeMethod::Bilinear, &mut out, None);
        assert!(matches!(err, Err(ScaleError::SourceTooSmall { got: 10, need: 64 })));
    }
}
