// SPDX-License-Identifier: MIT
//! # Crop and Resize Planning
//!
//! Matrix displays have a fixed square pixel grid, so every frame goes through
//! the same two decisions: which part of the source to keep, and how to
//! interpolate it down to the grid.
//!
//! 1. **CropBox**: optional centered square taken from the source
//! 2. **ScalePlan**: input size, crop and output size computed once per frame
//! 3. **ResizeMethod**: the interpolation kernel used by the resizer
//!
//! Cropping uses integer floor arithmetic so the same input always produces
//! the same box.

use fast_image_resize::{FilterType, ResizeAlg};

/// Represents a 2D size with width and height in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

impl Size {
    pub fn is_empty(self) -> bool {
        self.w == 0 || self.h == 0
    }
}

/// Sub-rectangle of the source image in source pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub w: u32,
    pub h: u32,
}

impl CropBox {
    pub fn size(self) -> Size {
        Size {
            w: self.w,
            h: self.h,
        }
    }

    /// Whether the box lies entirely inside an image of `size`.
    pub fn fits_within(self, size: Size) -> bool {
        self.left as u64 + self.w as u64 <= size.w as u64
            && self.top as u64 + self.h as u64 <= size.h as u64
    }
}

/// Centered square whose edge is `min(w, h)`.
///
/// `left = (w - edge) / 2` and `top = (h - edge) / 2`, floored.
pub fn center_square(input: Size) -> CropBox {
    let edge = input.w.min(input.h);
    CropBox {
        left: (input.w - edge) / 2,
        top: (input.h - edge) / 2,
        w: edge,
        h: edge,
    }
}

/// Complete scaling plan computed from input parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScalePlan {
    /// Original input dimensions
    pub input: Size,
    /// Region of the input that is resized, `None` for the whole frame
    pub crop: Option<CropBox>,
    /// Final output dimensions
    pub out: Size,
}

impl ScalePlan {
    /// Size of the region actually fed to the resizer.
    pub fn source_region(&self) -> Size {
        self.crop.map(CropBox::size).unwrap_or(self.input)
    }
}

/// Compute a scaling plan.
///
/// The output is always exactly `out`. When `crop_to_square` is false a
/// non-square input is stretched to fit.
pub fn build_plan(input: Size, out: Size, crop_to_square: bool) -> ScalePlan {
    ScalePlan {
        input,
        crop: crop_to_square.then(|| center_square(input)),
        out,
    }
}

/// Interpolation kernels selectable for both the device frame and its preview.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ResizeMethod {
    /// Nearest neighbour; keeps hard pixel edges
    #[default]
    Nearest,
    /// Linear interpolation over a 2x2 neighbourhood
    Bilinear,
    /// Cubic (Catmull-Rom) interpolation over a 4x4 neighbourhood
    Bicubic,
    /// Lanczos windowed sinc, three lobes
    Lanczos,
    /// Box filter (area average)
    Box,
    /// Hamming windowed filter
    Hamming,
}

impl ResizeMethod {
    pub const ALL: [ResizeMethod; 6] = [
        ResizeMethod::Nearest,
        ResizeMethod::Bilinear,
        ResizeMethod::Bicubic,
        ResizeMethod::Lanczos,
        ResizeMethod::Box,
        ResizeMethod::Hamming,
    ];

    /// The fast_image_resize algorithm implementing this method.
    pub fn to_alg(self) -> ResizeAlg {
        match self {
            ResizeMethod::Nearest => ResizeAlg::Nearest,
            ResizeMethod::Bilinear => ResizeAlg::Convolution(FilterType::Bilinear),
            ResizeMethod::Bicubic => ResizeAlg::Convolution(FilterType::CatmullRom),
            ResizeMethod::Lanczos => ResizeAlg::Convolution(FilterType::Lanczos3),
            ResizeMethod::Box => ResizeAlg::Convolution(FilterType::Box),
            ResizeMethod::Hamming => ResizeAlg::Convolution(FilterType::Hamming),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ResizeMethod::Nearest => "nearest",
            ResizeMethod::Bilinear => "bilinear",
            ResizeMethod::Bicubic => "bicubic",
            ResizeMethod::Lanczos => "lanczos",
            ResizeMethod::Box => "box",
            ResizeMethod::Hamming => "hamming",
        }
    }
}

impl std::fmt::Display for ResizeMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
