//! Decoder configuration types
//!
//! This module defines the minimal configuration needed by the decoder library.
//! Resolving timezone names, picking files and formatting output are left to the
//! application layer; the decoder only sees the resulting numbers.

use serde::{Deserialize, Serialize};

/// Configuration for the decoder library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Offset added to every valid timestamp, in seconds
    #[serde(default)]
    pub timezone_offset_secs: i64,

    /// Fill in missing timestamps from their scan-order neighbours
    #[serde(default = "default_true")]
    pub interpolate_timestamps: bool,

    /// Attach the payload hex of every binary entry to its record
    #[serde(default)]
    pub keep_raw_payload: bool,
}

fn default_true() -> bool {
    true
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            timezone_offset_secs: 0,
            interpolate_timestamps: true,
            keep_raw_payload: false,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the timezone offset in seconds
    pub fn with_timezone_offset(mut self, seconds: i64) -> Self {
        self.timezone_offset_secs = seconds;
        self
    }

    /// Builder method: set the timezone offset from (possibly fractional) hours
    pub fn with_timezone_hours(mut self, hours: f64) -> Self {
        self.timezone_offset_secs = (hours * 3600.0).round() as i64;
        self
    }

    /// Builder method: enable or disable timestamp interpolation
    pub fn with_interpolation(mut self, enabled: bool) -> Self {
        self.interpolate_timestamps = enabled;
        self
    }

    /// Builder method: keep the raw payload hex on every binary record
    pub fn with_raw_payload(mut self, enabled: bool) -> Self {
        self.keep_raw_payload = enabled;
        self
    }
}
