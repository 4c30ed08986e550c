//! Main decoder API
//!
//! This module provides the primary interface for the decoder library.
//! The Decoder struct is the entry point for turning a loaded log buffer into
//! a decoded timeline.

use crate::config::DecoderConfig;
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::formats::{self, RawEntry};
use crate::messages::text::decode_text_entry;
use crate::messages::MessageDecoder;
use crate::timestamp::{self, TimestampNormalizer};
use crate::types::{DecodedLog, LogBuffer, LogRecord, Result, Revision};
use std::path::Path;

/// A decoded log together with everything that was recovered from on the way
#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub log: DecodedLog,
    pub diagnostics: Diagnostics,
}

/// The main decoder struct - entry point for all decoding operations
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Create a decoder with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with an explicit configuration
    pub fn with_config(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode a loaded log buffer
    ///
    /// Decoding never fails. Anything unexpected in the buffer is recovered
    /// from and listed in the report's diagnostics.
    ///
    /// # Arguments
    /// * `buffer` - The whole log file and its label (usually the file name)
    ///
    /// # Returns
    /// * `DecodeReport` - Records newest first, plus the diagnostics sink
    ///
    /// # Example
    /// ```no_run
    /// use zero_log_decoder::{Decoder, LogBuffer};
    ///
    /// let data = std::fs::read("VIN_538SA1234567890AB_MBB_2020-01-01.bin").unwrap();
    /// let buffer = LogBuffer::new(data, "VIN_538SA1234567890AB_MBB_2020-01-01.bin");
    /// let report = Decoder::new().decode(&buffer);
    ///
    /// for record in &report.log.records {
    ///     println!("{} {}", record.time_text, record.event);
    /// }
    /// ```
    pub fn decode(&self, buffer: &LogBuffer) -> DecodeReport {
        log::info!("Decoding {} ({} bytes)", buffer.label(), buffer.len());

        let mut diagnostics = Diagnostics::new();
        let detected = formats::detect_format(buffer, &mut diagnostics);
        let entries = formats::locate_entries(buffer.data(), detected.revision, &mut diagnostics);

        let normalizer = TimestampNormalizer::new(self.config.timezone_offset_secs);
        let mut records = Vec::with_capacity(entries.len());
        for (ordinal, entry) in entries.iter().enumerate() {
            let mut record = match detected.revision {
                Revision::Rev2 => self.text_record(ordinal, entry),
                _ => self.binary_record(ordinal, entry, &mut diagnostics),
            };
            normalizer.apply(&mut record, Some(entry.offset), &mut diagnostics);
            records.push(record);
        }

        if self.config.interpolate_timestamps {
            timestamp::interpolate(&mut records);
        }
        timestamp::sort_newest_first(&mut records);

        log::info!(
            "{}: {} records, {} diagnostics",
            buffer.label(),
            records.len(),
            diagnostics.len()
        );

        DecodeReport {
            log: DecodedLog {
                source: buffer.label().to_string(),
                unit_type: detected.unit_type,
                revision: detected.revision,
                header: detected.header,
                records,
            },
            diagnostics,
        }
    }

    /// Read a file once and decode it
    pub fn decode_file(&self, path: &Path) -> Result<DecodeReport> {
        let buffer = LogBuffer::from_file(path)?;
        Ok(self.decode(&buffer))
    }

    /// Record for a length-prefixed binary entry
    fn binary_record(&self, ordinal: usize, entry: &RawEntry, diagnostics: &mut Diagnostics) -> LogRecord {
        let payload = entry.payload();
        let type_code = entry.type_code().unwrap_or_default();

        let message = match MessageDecoder::decode(type_code, payload) {
            Ok(message) => message,
            Err(short) => {
                diagnostics.record(
                    DiagnosticKind::DecodeFailure { type_code },
                    Some(entry.offset),
                    short.to_string(),
                );
                short.reduced_message()
            }
        };

        let uninterpreted = (self.config.keep_raw_payload && !payload.is_empty())
            .then(|| crate::bytes::hex_dump(payload));

        LogRecord {
            ordinal,
            type_code: Some(type_code),
            raw_timestamp: entry.raw_timestamp(),
            timestamp: None,
            interpolated: false,
            time_text: String::new(),
            event: message.event,
            fields: message.fields,
            conditions: message.conditions,
            uninterpreted,
        }
    }

    /// Record for a fencepost-delimited text entry
    fn text_record(&self, ordinal: usize, entry: &RawEntry) -> LogRecord {
        let decoded = decode_text_entry(&entry.body);
        LogRecord {
            ordinal,
            type_code: None,
            raw_timestamp: decoded.raw_timestamp,
            timestamp: None,
            interpolated: false,
            time_text: String::new(),
            event: decoded.message.event,
            fields: decoded.message.fields,
            conditions: decoded.message.conditions,
            uninterpreted: decoded.uninterpreted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitType;

    /// Length-prefixed entry: header, length, type, LE timestamp, payload
    fn entry(type_code: u8, timestamp: u32, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xB2, (payload.len() + 7) as u8, type_code];
        out.extend_from_slice(&timestamp.to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_decode_ring_buffer_entries() {
        let mut data = entry(0x09, 1_600_000_000, &[0x01]);
        data.extend(entry(0x09, 1_600_000_060, &[0x00]));
        let buffer = LogBuffer::new(data, "bike_MBB.bin");

        let report = Decoder::new().decode(&buffer);
        let log = report.log;
        assert_eq!(log.unit_type, UnitType::MainBoard);
        assert_eq!(log.revision, Revision::Rev3);
        assert_eq!(log.len(), 2);

        // Newest first, ordinals untouched
        assert_eq!(log.records[0].event, "Key Off");
        assert_eq!(log.records[0].ordinal, 1);
        assert_eq!(log.records[1].event, "Key On ");
        assert_eq!(log.records[1].time_text, "2020-09-13 12:26:40");
    }

    #[test]
    fn test_short_payload_gives_reduced_record() {
        let data = entry(0x2C, 1_600_000_000, &[0x01, 0x02]);
        let report = Decoder::new().decode(&LogBuffer::new(data, "bike_MBB.bin"));

        let record = &report.log.records[0];
        assert_eq!(record.event, "Riding Status");
        assert_eq!(record.conditions.as_deref(), Some("Insufficient data (2 of 27 bytes)"));
        assert!(report
            .diagnostics
            .contains(DiagnosticKind::DecodeFailure { type_code: 0x2C }));
    }

    #[test]
    fn test_raw_payload_and_timezone() {
        let data = entry(0x09, 1_600_000_000, &[0x01]);
        let config = DecoderConfig::new()
            .with_raw_payload(true)
            .with_timezone_hours(-1.0);
        let report = Decoder::with_config(config).decode(&LogBuffer::new(data, "bike_MBB.bin"));

        let record = &report.log.records[0];
        assert_eq!(record.uninterpreted.as_deref(), Some("0x01"));
        assert_eq!(record.timestamp, Some(1_600_000_000 - 3600));
    }

    #[test]
    fn test_interpolation_can_be_disabled() {
        let mut data = entry(0x09, 1_600_000_000, &[0x01]);
        data.extend(entry(0x09, 0, &[0x00]));
        let buffer = LogBuffer::new(data, "bike_MBB.bin");

        let filled = Decoder::new().decode(&buffer);
        assert!(filled.log.records.iter().all(|r| r.timestamp.is_some()));

        let config = DecoderConfig::new().with_interpolation(false);
        let raw = Decoder::with_config(config).decode(&buffer);
        assert_eq!(raw.log.records[1].timestamp, None);
        assert_eq!(raw.log.records[1].time_text, "0");
    }
}
