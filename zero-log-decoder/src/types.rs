//! Core types for the Zero log decoder library
//!
//! This module defines the fundamental types the decoder produces when processing
//! a log buffer. Buffers and headers are created once and never mutated; the only
//! thing that grows is the record list built from them.

use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Placeholder used for every header field that could not be read
pub const UNKNOWN: &str = "Unknown";

/// Errors that can surface to the caller
///
/// Per-entry problems never show up here; they are recorded in
/// [`crate::Diagnostics`] and the scan carries on.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Cannot merge logs with different VINs: '{left}' != '{right}'")]
    VinMismatch { left: String, right: String },

    #[error("No logs could be decoded")]
    NoLogs,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// An immutable, fully loaded log file plus the label it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBuffer {
    data: Vec<u8>,
    label: String,
}

impl LogBuffer {
    /// Wrap already-loaded bytes. The label is usually the file name.
    pub fn new(data: Vec<u8>, label: impl Into<String>) -> Self {
        Self {
            data,
            label: label.into(),
        }
    }

    /// Read a whole file into a buffer labelled with its path
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::new(data, path.to_string_lossy()))
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Base file name of the label (the part after the last path separator)
    pub fn file_name(&self) -> &str {
        self.label
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.label)
    }
}

/// Which control unit wrote the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitType {
    /// Main bike board (MBB)
    MainBoard,
    /// Battery management system (BMS)
    BatteryManagement,
    Unknown,
}

impl UnitType {
    /// Short name as used in file names and unit probes
    pub fn short_name(&self) -> &'static str {
        match self {
            UnitType::MainBoard => "MBB",
            UnitType::BatteryManagement => "BMS",
            UnitType::Unknown => "Unknown Type",
        }
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// On-disk layout generation
///
/// Rev0 and Rev1 use a length-prefixed ring buffer with a directory marker,
/// Rev2 delimits entries with rotating fenceposts, and Rev3 is the 2024+
/// ring buffer that starts straight away with entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Revision {
    Rev0,
    Rev1,
    Rev2,
    Rev3,
}

impl Revision {
    /// True for the revisions scanned by the length-prefixed window locator
    pub fn uses_length_prefixed_entries(&self) -> bool {
        !matches!(self, Revision::Rev2)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            Revision::Rev0 => 0,
            Revision::Rev1 => 1,
            Revision::Rev2 => 2,
            Revision::Rev3 => 3,
        };
        write!(f, "REV{}", n)
    }
}

/// Named header fields, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderField {
    Vin,
    SerialNumber,
    BmsSerialNumber,
    PackSerialNumber,
    InitialDate,
    Model,
    FirmwareRev,
    BoardRev,
}

impl HeaderField {
    pub fn label(&self) -> &'static str {
        match self {
            HeaderField::Vin => "VIN",
            HeaderField::SerialNumber => "Serial number",
            HeaderField::BmsSerialNumber => "BMS serial number",
            HeaderField::PackSerialNumber => "Pack serial number",
            HeaderField::InitialDate => "Initial date",
            HeaderField::Model => "Model",
            HeaderField::FirmwareRev => "Firmware rev.",
            HeaderField::BoardRev => "Board rev.",
        }
    }
}

impl fmt::Display for HeaderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for HeaderField {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Header metadata recovered by the format detector
///
/// Reading a header never fails: fields that could not be read hold
/// [`UNKNOWN`] or are simply absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogHeader {
    fields: BTreeMap<HeaderField, String>,
}

impl LogHeader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: HeaderField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn set(&mut self, field: HeaderField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    /// True when the field is absent or holds the placeholder
    pub fn is_unknown(&self, field: HeaderField) -> bool {
        self.get(field).map_or(true, |v| v == UNKNOWN)
    }

    /// The vehicle identifier, or [`UNKNOWN`]
    pub fn vin(&self) -> &str {
        self.get(HeaderField::Vin).unwrap_or(UNKNOWN)
    }

    pub fn iter(&self) -> impl Iterator<Item = (HeaderField, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A single structured value decoded from an entry payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Float(v) => write!(f, "{:.3}", v),
            FieldValue::Boolean(v) => write!(f, "{}", if *v { "true" } else { "false" }),
            FieldValue::Text(v) => f.write_str(v),
        }
    }
}

impl FieldValue {
    /// Numeric view, if the value has one
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            FieldValue::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(v) => Some(*v),
            FieldValue::Float(v) => Some(*v as i64),
            FieldValue::Boolean(v) => Some(if *v { 1 } else { 0 }),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

/// Structured fields of one record, keyed by field name
pub type Fields = BTreeMap<String, FieldValue>;

/// One decoded event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    /// Zero-based position in the original scan; never reassigned
    pub ordinal: usize,
    /// Entry type code (absent for text entries)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_code: Option<u8>,
    /// Timestamp exactly as stored in the entry
    pub raw_timestamp: u32,
    /// Validated, timezone-shifted seconds; `None` while missing
    pub timestamp: Option<i64>,
    /// True when `timestamp` was filled in by interpolation
    pub interpolated: bool,
    /// Human readable time of the event
    pub time_text: String,
    /// Event name
    pub event: String,
    /// Structured fields decoded from the payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Fields>,
    /// Legacy condition text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conditions: Option<String>,
    /// Payload bytes that were not interpreted, as hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uninterpreted: Option<String>,
}

impl LogRecord {
    /// One-based entry number as shown to users
    pub fn entry_number(&self) -> usize {
        self.ordinal + 1
    }

    pub fn has_structured_data(&self) -> bool {
        self.fields.as_ref().map_or(false, |f| !f.is_empty())
    }

    /// Numeric timestamp usable for sorting, if one is known
    pub fn sort_timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Content key used to drop duplicates when merging logs
    ///
    /// The ordinal is not part of the key: overlapping segments
    /// from different files reproduce the same event at different positions.
    /// Records without condition text are keyed by their rendered fields.
    pub fn dedup_key(&self) -> (String, String, String) {
        let detail = match (&self.conditions, &self.fields) {
            (Some(conditions), _) => conditions.clone(),
            (None, Some(fields)) => render_fields(fields),
            (None, None) => String::new(),
        };
        (self.time_text.clone(), self.event.clone(), detail)
    }
}

/// `name: value` pairs at full precision, in key order
fn render_fields(fields: &Fields) -> String {
    fields
        .iter()
        .map(|(name, value)| match value {
            FieldValue::Float(v) => format!("{}: {:?}", name, v),
            other => format!("{}: {}", name, other),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// A fully decoded log: header, format and the event timeline
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedLog {
    pub source: String,
    pub unit_type: UnitType,
    pub revision: Revision,
    pub header: LogHeader,
    /// Newest first; ties keep scan order
    pub records: Vec<LogRecord>,
}

impl DecodedLog {
    pub fn vin(&self) -> &str {
        self.header.vin()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_conversions() {
        let int_val = FieldValue::Integer(42);
        assert_eq!(int_val.as_f64(), Some(42.0));
        assert_eq!(int_val.as_i64(), Some(42));

        let float_val = FieldValue::Float(3.75);
        assert_eq!(float_val.as_f64(), Some(3.75));
        assert_eq!(float_val.as_i64(), Some(3));

        let text_val = FieldValue::from("Bike On");
        assert_eq!(text_val.as_f64(), None);
        assert_eq!(text_val.as_str(), Some("Bike On"));
    }

    #[test]
    fn test_field_value_display() {
        assert_eq!(format!("{}", FieldValue::Integer(42)), "42");
        assert_eq!(format!("{}", FieldValue::Float(3.14159)), "3.142");
        assert_eq!(format!("{}", FieldValue::Boolean(true)), "true");
    }

    #[test]
    fn test_header_unknown_handling() {
        let mut header = LogHeader::new();
        assert!(header.is_unknown(HeaderField::Vin));
        assert_eq!(header.vin(), UNKNOWN);

        header.set(HeaderField::Vin, UNKNOWN);
        assert!(header.is_unknown(HeaderField::Vin));

        header.set(HeaderField::Vin, "538SD1Z27JCG01234");
        assert!(!header.is_unknown(HeaderField::Vin));
        assert_eq!(header.vin(), "538SD1Z27JCG01234");
    }

    #[test]
    fn test_buffer_file_name() {
        let buffer = LogBuffer::new(vec![], "/tmp/logs/538SD1Z27JCG01234_MBB_2019-05-01.bin");
        assert_eq!(buffer.file_name(), "538SD1Z27JCG01234_MBB_2019-05-01.bin");

        let bare = LogBuffer::new(vec![], "bms.bin");
        assert_eq!(bare.file_name(), "bms.bin");
    }

    #[test]
    fn test_header_serializes_with_labels() {
        let mut header = LogHeader::new();
        header.set(HeaderField::InitialDate, "May 01 2019");
        header.set(HeaderField::Vin, "538SD1Z27JCG01234");
        let json = serde_json::to_string(&header).unwrap();
        assert_eq!(
            json,
            r#"{"VIN":"538SD1Z27JCG01234","Initial date":"May 01 2019"}"#
        );
    }

    #[test]
    fn test_dedup_key_uses_fields_without_conditions() {
        let mut fields = Fields::new();
        fields.insert("sensor_1".to_string(), FieldValue::Integer(1));
        let mut record = LogRecord {
            ordinal: 0,
            type_code: Some(0x54),
            raw_timestamp: 1_600_000_000,
            timestamp: Some(1_600_000_000),
            interpolated: false,
            time_text: "2020-09-13 12:26:40".to_string(),
            event: "Sensor Data".to_string(),
            fields: Some(fields),
            conditions: None,
            uninterpreted: None,
        };
        assert_eq!(record.dedup_key().2, "sensor_1: 1");

        let mut other = record.clone();
        other.fields = Some(Fields::from([("sensor_1".to_string(), FieldValue::Integer(99))]));
        assert_ne!(record.dedup_key(), other.dedup_key());

        record.conditions = Some("shown".to_string());
        assert_eq!(record.dedup_key().2, "shown");
    }
}
