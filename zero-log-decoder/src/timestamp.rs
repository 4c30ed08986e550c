//! Timestamp normalization
//!
//! Raw entry timestamps are epoch seconds. Placeholders (0x000..=0xFFF) and
//! values past the end of 2029 are treated as missing. After every entry of
//! a log is decoded, missing timestamps are filled in from their nearest
//! valid neighbours in scan order, then the timeline is sorted newest first.

use chrono::DateTime;

use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::types::LogRecord;

/// Largest raw value that is still a placeholder rather than a time
pub const PLACEHOLDER_MAX: u32 = 0xFFF;

/// 2030-01-01 00:00:00 UTC
pub const LATEST_VALID: u32 = 1_893_456_000;

/// Format of `LogRecord::time_text`
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Whether a raw timestamp denotes a real point in time
pub fn is_valid(raw: u32) -> bool {
    raw > PLACEHOLDER_MAX && raw <= LATEST_VALID
}

/// Render epoch seconds as `YYYY-MM-DD HH:MM:SS`
pub fn format_time(seconds: i64) -> Option<String> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.format(TIME_FORMAT).to_string())
}

/// Validates raw timestamps and applies the timezone offset
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampNormalizer {
    offset_secs: i64,
}

impl TimestampNormalizer {
    pub fn new(offset_secs: i64) -> Self {
        Self { offset_secs }
    }

    /// Shifted seconds for a valid raw timestamp
    pub fn normalize(&self, raw: u32) -> Option<i64> {
        is_valid(raw).then(|| raw as i64 + self.offset_secs)
    }

    /// Fill `timestamp` and `time_text` of a freshly decoded record
    ///
    /// An out-of-range value is recorded and left missing; its text is the
    /// raw number.
    pub fn apply(&self, record: &mut LogRecord, offset: Option<usize>, diagnostics: &mut Diagnostics) {
        record.timestamp = self.normalize(record.raw_timestamp);
        record.interpolated = false;

        match record.timestamp.and_then(format_time) {
            Some(text) => record.time_text = text,
            None => {
                record.timestamp = None;
                record.time_text = record.raw_timestamp.to_string();
                if record.raw_timestamp > PLACEHOLDER_MAX {
                    diagnostics.record(
                        DiagnosticKind::TimestampOutOfRange,
                        offset,
                        format!(
                            "entry {}: timestamp {} out of range",
                            record.entry_number(),
                            record.raw_timestamp
                        ),
                    );
                }
            }
        }
    }
}

/// Fill missing timestamps from the nearest valid neighbours in scan order
///
/// Records must still be in scan order. Between two neighbours the value is
/// placed linearly by ordinal distance; next to only one neighbour it moves
/// one second per ordinal step. Returns the number of records filled in.
pub fn interpolate(records: &mut [LogRecord]) -> usize {
    let known: Vec<(usize, i64)> = records
        .iter()
        .filter_map(|r| r.timestamp.map(|ts| (r.ordinal, ts)))
        .collect();
    if known.is_empty() {
        return 0;
    }

    let mut filled = 0;
    for record in records.iter_mut().filter(|r| r.timestamp.is_none()) {
        let ordinal = record.ordinal;
        let split = known.partition_point(|(o, _)| *o < ordinal);
        let before = split.checked_sub(1).map(|i| known[i]);
        let after = known.get(split).copied();

        let estimate = match (before, after) {
            (Some((bo, bt)), Some((ao, at))) => {
                if ao == bo {
                    bt
                } else {
                    let ratio = (ordinal - bo) as f64 / (ao - bo) as f64;
                    bt + (ratio * (at - bt) as f64).round() as i64
                }
            }
            (Some((bo, bt)), None) => bt + (ordinal - bo) as i64,
            (None, Some((ao, at))) => at - (ao - ordinal) as i64,
            (None, None) => continue,
        };
        if estimate <= 0 {
            continue;
        }

        if let Some(text) = format_time(estimate) {
            log::debug!(
                "Interpolated timestamp for entry {}: {} (was: {})",
                record.entry_number(),
                text,
                record.time_text
            );
            record.timestamp = Some(estimate);
            record.time_text = text;
            record.interpolated = true;
            filled += 1;
        }
    }

    if filled > 0 {
        log::info!("Interpolated {} missing timestamps", filled);
    }
    filled
}

/// Newest first; records without a timestamp go last, ties keep scan order
pub fn sort_newest_first(records: &mut [LogRecord]) {
    records.sort_by(|a, b| match (a.timestamp, b.timestamp) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ordinal: usize, raw: u32) -> LogRecord {
        LogRecord {
            ordinal,
            type_code: None,
            raw_timestamp: raw,
            timestamp: None,
            interpolated: false,
            time_text: String::new(),
            event: format!("event {}", ordinal),
            fields: None,
            conditions: None,
            uninterpreted: None,
        }
    }

    fn normalized(raws: &[u32]) -> Vec<LogRecord> {
        let normalizer = TimestampNormalizer::default();
        let mut diagnostics = Diagnostics::new();
        raws.iter()
            .enumerate()
            .map(|(i, raw)| {
                let mut r = record(i, *raw);
                normalizer.apply(&mut r, None, &mut diagnostics);
                r
            })
            .collect()
    }

    #[test]
    fn test_validity_bounds() {
        assert!(!is_valid(0));
        assert!(!is_valid(0xFFF));
        assert!(is_valid(0x1000));
        assert!(is_valid(LATEST_VALID));
        assert!(!is_valid(LATEST_VALID + 1));
    }

    #[test]
    fn test_apply_formats_and_shifts() {
        let normalizer = TimestampNormalizer::new(3600);
        let mut diagnostics = Diagnostics::new();
        let mut r = record(0, 1_546_300_800); // 2019-01-01 00:00:00 UTC
        normalizer.apply(&mut r, None, &mut diagnostics);
        assert_eq!(r.timestamp, Some(1_546_304_400));
        assert_eq!(r.time_text, "2019-01-01 01:00:00");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_apply_missing() {
        let normalizer = TimestampNormalizer::default();
        let mut diagnostics = Diagnostics::new();

        let mut placeholder = record(0, 12);
        normalizer.apply(&mut placeholder, None, &mut diagnostics);
        assert_eq!(placeholder.timestamp, None);
        assert_eq!(placeholder.time_text, "12");
        assert!(diagnostics.is_empty());

        let mut future = record(1, u32::MAX);
        normalizer.apply(&mut future, Some(0x40), &mut diagnostics);
        assert_eq!(future.timestamp, None);
        assert_eq!(diagnostics.count(DiagnosticKind::TimestampOutOfRange), 1);
    }

    #[test]
    fn test_interpolate_between_neighbours() {
        let mut records = normalized(&[1_600_000_000, 0, 0, 0, 1_600_000_040]);
        assert_eq!(interpolate(&mut records), 3);
        assert_eq!(records[1].timestamp, Some(1_600_000_010));
        assert_eq!(records[2].timestamp, Some(1_600_000_020));
        assert_eq!(records[3].timestamp, Some(1_600_000_030));
        assert!(records[2].interpolated);
        assert!(!records[0].interpolated);
    }

    #[test]
    fn test_interpolate_at_boundaries() {
        let mut records = normalized(&[0, 0, 1_600_000_000, 0]);
        assert_eq!(interpolate(&mut records), 3);
        assert_eq!(records[0].timestamp, Some(1_599_999_998));
        assert_eq!(records[1].timestamp, Some(1_599_999_999));
        assert_eq!(records[3].timestamp, Some(1_600_000_001));
    }

    #[test]
    fn test_interpolate_without_anchor() {
        let mut records = normalized(&[0, 5]);
        assert_eq!(interpolate(&mut records), 0);
        assert!(records.iter().all(|r| r.timestamp.is_none()));
    }

    #[test]
    fn test_sort_newest_first_keeps_ordinals() {
        let mut records = normalized(&[1_600_000_000, 0, 1_600_000_100, 1_600_000_100]);
        sort_newest_first(&mut records);
        let ordinals: Vec<usize> = records.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![2, 3, 0, 1]);
    }
}
