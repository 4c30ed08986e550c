//! Merging decoded logs of the same vehicle
//!
//! Logs pulled from the same bike at different times overlap. Merging keeps
//! the first log intact and appends the events of the second one that it does
//! not already contain, keyed by time text, event name and condition text.

use std::collections::HashSet;

use crate::types::{DecodedLog, DecoderError, HeaderField, Result, UNKNOWN};

/// Merge `b` into `a`
///
/// Fails with [`DecoderError::VinMismatch`] when both logs carry a known VIN
/// and the two differ. Header fields that `a` lacks (or holds as unknown) are
/// taken from `b`.
///
/// Only `a`'s keys are checked: records of `b` that duplicate each other but
/// nothing in `a` are all appended.
pub fn merge(a: DecodedLog, b: DecodedLog) -> Result<DecodedLog> {
    let (vin_a, vin_b) = (a.vin(), b.vin());
    if vin_a != UNKNOWN && vin_b != UNKNOWN && vin_a != vin_b {
        return Err(DecoderError::VinMismatch {
            left: vin_a.to_string(),
            right: vin_b.to_string(),
        });
    }

    let mut merged = a;

    for (field, value) in b.header.iter() {
        if value != UNKNOWN && merged.header.is_unknown(field) {
            log::debug!("Adopting {} '{}' from {}", field, value, b.source);
            merged.header.set(field, value);
        }
    }
    if merged.header.get(HeaderField::Vin).is_none() {
        merged.header.set(HeaderField::Vin, UNKNOWN);
    }

    let seen: HashSet<(String, String, String)> =
        merged.records.iter().map(|r| r.dedup_key()).collect();
    let before = merged.records.len();
    let offered = b.records.len();
    merged
        .records
        .extend(b.records.into_iter().filter(|r| !seen.contains(&r.dedup_key())));

    let added = merged.records.len() - before;
    log::info!(
        "Merged {} into {}: {} new entries, {} duplicates",
        b.source,
        merged.source,
        added,
        offered - added
    );

    Ok(merged)
}

/// Fold any number of logs left to right
///
/// A log whose VIN conflicts with the accumulated result is skipped and its
/// error returned in the second slot. Fails with [`DecoderError::NoLogs`]
/// only when `logs` is empty.
pub fn merge_all(logs: Vec<DecodedLog>) -> Result<(DecodedLog, Vec<DecoderError>)> {
    let mut logs = logs.into_iter();
    let mut merged = logs.next().ok_or(DecoderError::NoLogs)?;
    let mut skipped = Vec::new();

    for next in logs {
        let source = next.source.clone();
        // merge() consumes the accumulator, so mismatches are caught up front
        let (vin_a, vin_b) = (merged.vin(), next.vin());
        if vin_a != UNKNOWN && vin_b != UNKNOWN && vin_a != vin_b {
            log::warn!("Skipping {}: VIN {} does not match {}", source, vin_b, vin_a);
            skipped.push(DecoderError::VinMismatch {
                left: vin_a.to_string(),
                right: vin_b.to_string(),
            });
            continue;
        }
        merged = merge(merged, next)?;
    }

    Ok((merged, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogHeader, LogRecord, Revision, UnitType};

    fn record(ordinal: usize, time: &str, event: &str) -> LogRecord {
        LogRecord {
            ordinal,
            type_code: Some(0x2C),
            raw_timestamp: 0,
            timestamp: None,
            interpolated: false,
            time_text: time.to_string(),
            event: event.to_string(),
            fields: None,
            conditions: Some("cond".to_string()),
            uninterpreted: None,
        }
    }

    fn log_with(vin: &str, records: Vec<LogRecord>) -> DecodedLog {
        let mut header = LogHeader::new();
        header.set(HeaderField::Vin, vin);
        DecodedLog {
            source: format!("{}.bin", vin),
            unit_type: UnitType::MainBoard,
            revision: Revision::Rev1,
            header,
            records,
        }
    }

    #[test]
    fn test_merge_with_copy_is_identity() {
        let log = log_with(
            "538SA1234567890AB",
            vec![record(0, "2020-01-01 00:00:00", "Riding"), record(1, "2020-01-01 00:00:01", "Key Off")],
        );
        let merged = merge(log.clone(), log.clone()).unwrap();
        assert_eq!(merged.records, log.records);
        assert_eq!(merged.header, log.header);
    }

    #[test]
    fn test_merge_dedups_by_content_not_ordinal() {
        let a = log_with(UNKNOWN, vec![record(0, "2020-01-01 00:00:00", "Riding")]);
        let b = log_with(UNKNOWN, vec![record(7, "2020-01-01 00:00:00", "Riding")]);
        assert_eq!(merge(a, b).unwrap().len(), 1);
    }

    #[test]
    fn test_merge_appends_new_records_after_a() {
        let a = log_with(UNKNOWN, vec![record(0, "2020-01-01 00:00:05", "Riding")]);
        let b = log_with(
            UNKNOWN,
            vec![record(0, "2020-01-01 00:00:09", "Key On"), record(1, "2020-01-01 00:00:05", "Riding")],
        );
        let merged = merge(a, b).unwrap();
        let events: Vec<&str> = merged.records.iter().map(|r| r.event.as_str()).collect();
        assert_eq!(events, vec!["Riding", "Key On"]);
    }

    #[test]
    fn test_merge_vin_rules() {
        let known = log_with("538SA1234567890AB", vec![]);
        let other = log_with("538SA9999999999ZZ", vec![]);
        let unknown = log_with(UNKNOWN, vec![]);

        assert!(matches!(
            merge(known.clone(), other),
            Err(DecoderError::VinMismatch { .. })
        ));
        assert_eq!(merge(unknown.clone(), known.clone()).unwrap().vin(), "538SA1234567890AB");
        assert_eq!(merge(known, unknown).unwrap().vin(), "538SA1234567890AB");
    }

    #[test]
    fn test_merge_adopts_missing_header_fields() {
        let mut a = log_with(UNKNOWN, vec![]);
        a.header.set(HeaderField::Model, "SR");
        a.header.set(HeaderField::SerialNumber, UNKNOWN);
        let mut b = log_with(UNKNOWN, vec![]);
        b.header.set(HeaderField::Model, "DSR");
        b.header.set(HeaderField::SerialNumber, "SN123");
        b.header.set(HeaderField::FirmwareRev, "45");

        let merged = merge(a, b).unwrap();
        assert_eq!(merged.header.get(HeaderField::Model), Some("SR"));
        assert_eq!(merged.header.get(HeaderField::SerialNumber), Some("SN123"));
        assert_eq!(merged.header.get(HeaderField::FirmwareRev), Some("45"));
    }

    #[test]
    fn test_merge_all_skips_mismatches() {
        let first = log_with("538SA1234567890AB", vec![record(0, "t1", "A")]);
        let stranger = log_with("538SA9999999999ZZ", vec![record(0, "t2", "B")]);
        let same = log_with(UNKNOWN, vec![record(0, "t3", "C")]);

        let (merged, skipped) = merge_all(vec![first, stranger, same]).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(skipped.len(), 1);

        assert!(matches!(merge_all(Vec::new()), Err(DecoderError::NoLogs)));
    }

    #[test]
    fn test_merge_keeps_duplicates_within_b() {
        let a = log_with(UNKNOWN, vec![record(0, "2020-01-01 00:00:00", "Riding")]);
        let b = log_with(
            UNKNOWN,
            vec![record(0, "2020-01-01 00:00:09", "Key On"), record(1, "2020-01-01 00:00:09", "Key On")],
        );
        assert_eq!(merge(a, b).unwrap().len(), 3);
    }
}
