//! Per-decode diagnostics sink
//!
//! Anomalies found while reading a header or scanning entries are recovered
//! locally and recorded here instead of aborting the decode. A fresh sink is
//! created for every decode call and handed back to the caller with the log.

use serde::Serialize;
use std::fmt;

/// Kind of anomaly that was recovered from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiagnosticKind {
    /// No unit or revision heuristic matched
    UnknownFormat,
    /// Bytes at the scan position did not start an entry
    InvalidEntryHeader,
    /// Declared entry length was unusable
    TruncatedEntry,
    /// Escape marker with no successor byte
    UnescapeAnomaly,
    /// A type-specific decoder could not use the payload
    DecodeFailure { type_code: u8 },
    /// Raw timestamp outside the plausible range, treated as missing
    TimestampOutOfRange,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticKind::UnknownFormat => f.write_str("unknown format"),
            DiagnosticKind::InvalidEntryHeader => f.write_str("invalid entry header"),
            DiagnosticKind::TruncatedEntry => f.write_str("truncated entry"),
            DiagnosticKind::UnescapeAnomaly => f.write_str("unescape anomaly"),
            DiagnosticKind::DecodeFailure { type_code } => {
                write!(f, "decode failure (type 0x{:02x})", type_code)
            }
            DiagnosticKind::TimestampOutOfRange => f.write_str("timestamp out of range"),
        }
    }
}

/// One recorded anomaly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Byte offset in the scanned region, when one applies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} at 0x{:x}: {}", self.kind, offset, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Accumulated diagnostics for one decode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an anomaly and forward it to the log facade
    pub fn record(&mut self, kind: DiagnosticKind, offset: Option<usize>, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            offset,
            message: message.into(),
        };

        match kind {
            DiagnosticKind::UnknownFormat => log::warn!("{}", diagnostic),
            DiagnosticKind::DecodeFailure { .. } | DiagnosticKind::UnescapeAnomaly => {
                log::debug!("{}", diagnostic)
            }
            _ => log::trace!("{}", diagnostic),
        }

        self.entries.push(diagnostic);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Number of diagnostics of the given kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn contains(&self, kind: DiagnosticKind) -> bool {
        self.entries.iter().any(|d| d.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move everything recorded in `other` into this sink
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }
}
