//! # Configuration Module
//!
//! Stream settings fixed for the lifetime of a run, and the live processing
//! settings the control surface may change at any time.

pub mod config;
pub mod processing;

pub use config::StreamConfig;
pub use processing::{ProcessingConfig, SharedConfig};
