//! # Core Types
//!
//! Pixel buffers shared by every stage of the pipeline.

pub mod frame;

pub use frame::{DEVICE_SIZE, DeviceFrame, PREVIEW_SIZE, PixelFormat, PreviewFrame, RawImage};
