//! Live processing settings shared between the control surface and the
//! stream loop.
//!
//! The control surface is the only writer. Readers take a [`Copy`] snapshot at
//! the start of each tick, so a frame is always processed with one consistent
//! set of options even if a toggle lands mid-tick; the toggle simply shows up
//! on the next tick.

use std::sync::Arc;

use parking_lot::RwLock;
use pixel_scale::ResizeMethod;

use crate::processing::Filter;

/// Per-frame image options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingConfig {
    /// Crop to the centered square before resizing
    pub crop_to_square: bool,
    /// Interpolation used for both the device frame and the preview
    pub resize_method: ResizeMethod,
    /// Filter applied after resizing
    pub filter: Filter,
    /// Draw the device-pixel grid on the preview
    pub show_grid: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            crop_to_square: false,
            resize_method: ResizeMethod::Nearest,
            filter: Filter::None,
            show_grid: true,
        }
    }
}

/// Single-writer, many-reader cell holding the current [`ProcessingConfig`].
///
/// Cloning the handle shares the cell.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<ProcessingConfig>>,
}

impl SharedConfig {
    pub fn new(config: ProcessingConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> ProcessingConfig {
        *self.inner.read()
    }

    /// Edit settings in place; returns the new value.
    pub fn update(&self, edit: impl FnOnce(&mut ProcessingConfig)) -> ProcessingConfig {
        let mut guard = self.inner.write();
        edit(&mut *guard);
        *guard
    }

    pub fn set_crop_to_square(&self, on: bool) {
        self.update(|c| c.crop_to_square = on);
    }

    pub fn set_resize_method(&self, method: ResizeMethod) {
        self.update(|c| c.resize_method = method);
    }

    pub fn set_filter(&self, filter: Filter) {
        self.update(|c| c.filter = filter);
    }

    pub fn set_show_grid(&self, on: bool) {
        self.update(|c| c.show_grid = on);
    }
}
