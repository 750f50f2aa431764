//! RTSP CLI Library
//!
//! Shared functionality for the RTSP command-line player.

pub mod config;
pub mod stats;

pub use config::{Config, ConfigError, ServerConfig, SessionOverrides};
pub use stats::{display_compact_stats, format_bytes, format_duration, format_report};
