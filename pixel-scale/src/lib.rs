// SPDX-License-Identifier: MIT
//! # pixel-scale: Fixed-Grid Scaling for Matrix Displays
//!
//! This crate turns arbitrarily sized screen captures into the tiny, fixed
//! pixel grids accepted by LED matrix displays, and blows those grids back up
//! for on-screen previews.
//!
//! ## Key Components
//!
//! - [`plan`]: crop/resize planning (centered square crop, target size) and the
//!   [`ResizeMethod`](plan::ResizeMethod) table
//! - [`cpu`]: CPU scaling built on fast_image_resize (SIMD accelerated)
//!
//! ## Usage Example
//!
//! ```rust
//! use pixel_scale::cpu::scale_u8x4;
//! use pixel_scale::plan::{build_plan, ResizeMethod, Size};
//!
//! let input = Size { w: 200, h: 100 };
//! let src = vec![0u8; 200 * 100 * 4];
//! let plan = build_plan(input, Size { w: 64, h: 64 }, true);
//! assert_eq!(plan.crop.map(|c| (c.left, c.top, c.w, c.h)), Some((50, 0, 100, 100)));
//!
//! let mut resizer = fast_image_resize::Resizer::new();
//! let mut out = vec![0u8; 64 * 64 * 4];
//! scale_u8x4(
//!     &mut resizer,
//!     &src,
//!     Some(200 * 4),
//!     &plan,
//!     ResizeMethod::Nearest,
//!     &mut out,
//!     None,
//! )
//! .unwrap();
//! ```

pub mod cpu;
pub mod plan;

pub use cpu::{ScaleError, Staging, scale_u8x4};
pub use plan::{CropBox, ResizeMethod, ScalePlan, Size, build_plan, center_square};
