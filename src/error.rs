//! # Error Handling
//!
//! One error type covers the whole capture-to-device pipeline. Variants map to
//! the failure classes the stream loop distinguishes:
//!
//! - `Capture`: the screen subsystem could not be queried
//! - `Load`: a static image could not be read or decoded
//! - `Processing`: crop/resize/filter rejected the frame
//! - `NotConnected` / `Connect`: no sink, or a sink could not be reached
//! - `Sink`: the device rejected a write
//! - `Busy`: a one-shot action collided with a running stream
//!
//! Inside the loop every error is a skipped tick. One-shot actions hand the
//! error straight back to the caller.
//!
//! ## Usage
//!
//! ```rust
//! use pixoo_mirror::error::{Recoverable, StreamError};
//!
//! let error = StreamError::processing("crop", "zero-area crop box");
//! assert_eq!(error.category(), "processing");
//! assert!(error.is_recoverable());
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors produced by sources, the processor, the renderer and sinks.
#[derive(Debug, Error)]
pub enum StreamError {
    /// Screen capture subsystem unavailable or denied
    #[error("screen capture failed: {reason}")]
    Capture { reason: String },

    /// Bad path, unsupported format or decode failure
    #[error("failed to load image '{}': {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// Crop, resize or filter failure
    #[error("processing failed during {operation}: {reason}")]
    Processing {
        operation: &'static str,
        reason: String,
    },

    /// The action needs a connected sink
    #[error("no device connected")]
    NotConnected,

    /// Connecting to the device failed
    #[error("failed to connect to device at {address}: {reason}")]
    Connect { address: String, reason: String },

    /// The device rejected or did not acknowledge a frame
    #[error("device write failed: {reason}")]
    Sink { reason: String },

    /// A one-shot action was attempted while the stream loop owns the device
    #[error("{action} is unavailable while streaming")]
    Busy { action: &'static str },

    /// Configuration validation errors
    #[error("invalid value for '{field}': {reason}")]
    Config { field: &'static str, reason: String },

    /// The stream worker thread could not be started or died
    #[error("stream worker failed: {reason}")]
    Worker { reason: String },
}

/// Result type alias using the stream error type
pub type StreamResult<T> = Result<T, StreamError>;

impl StreamError {
    pub fn capture(reason: impl Into<String>) -> Self {
        Self::Capture {
            reason: reason.into(),
        }
    }

    pub fn load(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn processing(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Processing {
            operation,
            reason: reason.into(),
        }
    }

    pub fn connect(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connect {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn sink(reason: impl Into<String>) -> Self {
        Self::Sink {
            reason: reason.into(),
        }
    }

    pub fn config(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Config {
            field,
            reason: reason.into(),
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::Capture { .. } => "capture",
            Self::Load { .. } => "load",
            Self::Processing { .. } => "processing",
            Self::NotConnected => "not_connected",
            Self::Connect { .. } => "connect",
            Self::Sink { .. } => "sink",
            Self::Busy { .. } => "busy",
            Self::Config { .. } => "config",
            Self::Worker { .. } => "worker",
        }
    }
}

impl From<pixel_scale::ScaleError> for StreamError {
    fn from(error: pixel_scale::ScaleError) -> Self {
        Self::processing("resize", error.to_string())
    }
}

/// Recovery strategies for handling errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Retry the operation after a delay
    Retry { delay_ms: u64 },
    /// Drop the current frame and carry on with the next tick
    Skip,
    /// Tear down and reopen the component
    Reinitialize { component: &'static str },
    /// Needs the user to change something
    UserAction { hint: &'static str },
}

/// Trait for errors that can be recovered from
pub trait Recoverable {
    /// Check if this error can be recovered from without user input
    fn is_recoverable(&self) -> bool;

    /// Get recovery strategies for this error, most preferred first
    fn recovery_strategies(&self) -> Vec<RecoveryStrategy>;
}

impl Recoverable for StreamError {
    fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Capture { .. }
                | Self::Processing { .. }
                | Self::NotConnected
                | Self::Sink { .. }
                | Self::Busy { .. }
        )
    }

    fn recovery_strategies(&self) -> Vec<RecoveryStrategy> {
        match self {
            Self::Capture { .. } => vec![
                RecoveryStrategy::Skip,
                RecoveryStrategy::Reinitialize {
                    component: "screen_capturer",
                },
            ],
            Self::Processing { .. } => vec![RecoveryStrategy::Skip],
            Self::NotConnected => vec![RecoveryStrategy::Retry { delay_ms: 500 }],
            Self::Sink { .. } => vec![
                RecoveryStrategy::Skip,
                RecoveryStrategy::Retry { delay_ms: 1000 },
            ],
            Self::Busy { .. } => vec![RecoveryStrategy::UserAction {
                hint: "stop streaming first",
            }],
            Self::Load { .. } => vec![RecoveryStrategy::UserAction {
                hint: "pick a readable PNG, JPEG, GIF, BMP or WebP file",
            }],
            Self::Connect { .. } => vec![RecoveryStrategy::UserAction {
                hint: "check the device address and that it is on the same network",
            }],
            Self::Config { .. } | Self::Worker { .. } => vec![],
        }
    }
}
