//! Zero Log Decoder Library
//!
//! A stateless, reusable library for decoding the binary event logs written by
//! the main board (MBB) and battery management system (BMS) of Zero
//! motorcycles.
//!
//! # Architecture
//!
//! This library is intentionally minimal and focused on decoding:
//! - Detects unit type and log revision from a loaded buffer and reads the header
//! - Locates entries in the ring buffer (length-prefixed or fencepost-delimited)
//! - Reverses the escape transform and decodes every entry type it knows
//! - Validates and interpolates timestamps, then orders the timeline newest first
//! - Merges overlapping logs of the same vehicle
//!
//! The library does NOT:
//! - Pick files, resolve timezone names or parse command lines
//! - Write text, CSV or JSON reports
//! - Classify events by severity
//!
//! All higher-level functionality is in the application layer (zero-log-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use zero_log_decoder::{merge_all, Decoder, DecoderConfig};
//! use std::path::Path;
//!
//! // Configure decoder
//! let config = DecoderConfig::new()
//!     .with_timezone_hours(-7.0)
//!     .with_interpolation(true);
//! let decoder = Decoder::with_config(config);
//!
//! // Decode both units of the same bike
//! let mbb = decoder.decode_file(Path::new("538SA1234567890AB_MBB.bin")).unwrap();
//! let bms = decoder.decode_file(Path::new("538SA1234567890AB_BMS0.bin")).unwrap();
//!
//! for diagnostic in mbb.diagnostics.iter() {
//!     eprintln!("{}", diagnostic);
//! }
//!
//! let (timeline, skipped) = merge_all(vec![mbb.log, bms.log]).unwrap();
//! for record in &timeline.records {
//!     println!("{:>5} {} {}", record.entry_number(), record.time_text, record.event);
//! }
//! assert!(skipped.is_empty());
//! ```

// Public modules
pub mod bytes;
pub mod config;
pub mod decoder;
pub mod diagnostics;
pub mod formats;
pub mod merge;
pub mod messages;
pub mod timestamp;
pub mod types;

// Re-export main types for convenience
pub use config::DecoderConfig;
pub use decoder::{DecodeReport, Decoder};
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use formats::{detect_format, DetectedFormat};
pub use merge::{merge, merge_all};
pub use messages::{DecodedMessage, MessageDecoder, MessageType};
pub use types::{
    DecodedLog, DecoderError, FieldValue, Fields, HeaderField, LogBuffer, LogHeader, LogRecord,
    Result, Revision, UnitType, UNKNOWN,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an empty buffer decodes to an empty log
        let report = Decoder::new().decode(&LogBuffer::new(Vec::new(), "empty.bin"));
        assert!(report.log.is_empty());
        assert_eq!(report.log.vin(), UNKNOWN);
        assert!(!VERSION.is_empty());
    }
}
