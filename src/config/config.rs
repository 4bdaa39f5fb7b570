//! # Stream Configuration
//!
//! Settings that shape the stream loop itself, as opposed to the per-frame
//! [`ProcessingConfig`](super::ProcessingConfig) that can change mid-stream.
//!
//! | Parameter | Type | Range | Description |
//! |-----------|------|-------|-------------|
//! | `fps` | `u32` | 1-240 | Target ticks per second |
//! | `region` | `CaptureRegion` | primary, display:N, square:N | What to capture |
//! | `idle_poll` | `Duration` | 10ms-10s | Wait between checks while no device is connected |
//! | `http_timeout` | `Duration` | 100ms-60s | Per-request timeout for network sinks |
//!
//! Nothing here is persisted; every run starts from [`StreamConfig::default`]
//! plus command-line overrides.
//!
//! ```rust
//! use pixoo_mirror::config::StreamConfig;
//!
//! let config = StreamConfig::default();
//! assert_eq!(config.fps, 60);
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use crate::capture::CaptureRegion;
use crate::error::{StreamError, StreamResult};

/// Loop pacing and collaborator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Target ticks per second. The loop never runs faster; under load it
    /// simply runs slower.
    pub fps: u32,

    /// Screen region captured on each tick.
    pub region: CaptureRegion,

    /// How long the loop waits before re-checking for a device while none is
    /// connected.
    pub idle_poll: Duration,

    /// Request timeout for the Pixoo HTTP sink.
    pub http_timeout: Duration,
}

impl Default for StreamConfig {
    /// Defaults:
    /// - `fps`: 60
    /// - `region`: primary display
    /// - `idle_poll`: 500 ms
    /// - `http_timeout`: 2 s
    fn default() -> Self {
        Self {
            fps: 60,
            region: CaptureRegion::Primary,
            idle_poll: Duration::from_millis(500),
            http_timeout: Duration::from_secs(2),
        }
    }
}

impl StreamConfig {
    /// Time budget for one tick.
    pub fn frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> StreamResult<()> {
        if !(1..=240).contains(&self.fps) {
            return Err(StreamError::config("fps", "must be between 1 and 240"));
        }
        if self.idle_poll < Duration::from_millis(10) || self.idle_poll > Duration::from_secs(10) {
            return Err(StreamError::config(
                "idle_poll",
                "must be between 10ms and 10s",
            ));
        }
        if self.http_timeout < Duration::from_millis(100)
            || self.http_timeout > Duration::from_secs(60)
        {
            return Err(StreamError::config(
                "http_timeout",
                "must be between 100ms and 60s",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.fps, 60);
        assert_eq!(config.region, CaptureRegion::Primary);
        assert_eq!(config.idle_poll, Duration::from_millis(500));
        let budget = config.frame_duration();
        assert!(budget > Duration::from_micros(16_660) && budget < Duration::from_micros(16_680));
    }

    #[test]
    fn test_config_validation() {
        let mut config = StreamConfig::default();
        assert!(config.validate().is_ok());

        config.fps = 0;
        assert!(config.validate().is_err());
        config.fps = 500;
        assert!(config.validate().is_err());
        config.fps = 30;

        config.idle_poll = Duration::ZERO;
        assert!(config.validate().is_err());
        config.idle_poll = Duration::from_millis(500);

        config.http_timeout = Duration::from_secs(120);
        assert!(config.validate().is_err());
        config.http_timeout = Duration::from_secs(2);

        assert!(config.validate().is_ok());
    }
}
