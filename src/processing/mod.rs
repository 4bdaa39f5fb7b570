//! # Processing Module
//!
//! The pure half of the pipeline: raw image → device frame → preview.

pub mod filters;
pub mod preview;
pub mod processing;

// Re-export commonly used types for convenience
pub use filters::Filter;
pub use preview::{GRID_COLOR, GRID_SPACING, PreviewRenderer, is_grid_pixel};
pub use processing::ImageProcessor;
