//! Fencepost-delimited entries (Rev2)
//!
//! Rev2 logs have no length prefix. Each entry is marked by a three byte
//! fencepost `[b0, v, b2]` where `b0` and `b2` come from the header and `v`
//! counts up by one per entry, skipping 0x00 and 0xFE. An entry payload runs
//! from four bytes before its fencepost to four bytes before the next one:
//!
//! ```text
//! <ts (BE u32)> <b0 v b2> <message ... 00> [00 B2 <binary tail>]
//! ```

use super::RawEntry;
use crate::diagnostics::{DiagnosticKind, Diagnostics};

/// Header offsets of the two fixed fencepost bytes
const FENCEPOST_BYTE0_OFFSET: usize = 0x0A;
const FENCEPOST_BYTE2_OFFSET: usize = 0x0C;

/// Largest plausible distance between two consecutive fenceposts
pub const MAX_ENTRY_GAP: usize = 256;

/// Bytes of timestamp stored in front of each fencepost
const TIMESTAMP_LEAD: usize = 4;

/// Next fencepost counter value
///
/// Wraps from 0xFF back to 0x01 and never yields 0x00 or 0xFE.
pub fn next_value(value: u8) -> u8 {
    match value.wrapping_add(1) {
        0x00 => 0x01,
        0xFE => 0xFF,
        next => next,
    }
}

/// Locates fencepost-delimited entries in a whole buffer
#[derive(Debug, Clone, Copy)]
pub struct FencepostLocator<'a> {
    data: &'a [u8],
    byte0: u8,
    byte2: u8,
}

impl<'a> FencepostLocator<'a> {
    /// Read the fixed fencepost bytes from the header
    pub fn new(data: &'a [u8]) -> Option<Self> {
        Some(Self {
            data,
            byte0: *data.get(FENCEPOST_BYTE0_OFFSET)?,
            byte2: *data.get(FENCEPOST_BYTE2_OFFSET)?,
        })
    }

    fn fencepost(&self, value: u8) -> [u8; 3] {
        [self.byte0, value, self.byte2]
    }

    /// First `[b0, any, b2]` in the buffer: position and counter value
    pub fn first_fencepost(&self) -> Option<(usize, u8)> {
        self.data
            .windows(3)
            .position(|w| w[0] == self.byte0 && w[2] == self.byte2)
            .map(|pos| (pos, self.data[pos + 1]))
    }

    /// First fencepost with `value` that begins within reach after `start`
    fn find_after(&self, value: u8, start: usize) -> Option<usize> {
        let reach = (start + MAX_ENTRY_GAP + 3).min(self.data.len());
        crate::bytes::find(&self.data[..reach], &self.fencepost(value), start + 1)
    }

    /// Next fencepost within reach of `start`
    ///
    /// Candidates are tried in counter order, so a missing or corrupted
    /// fencepost is stepped over. Gives up once the counter comes back
    /// around to `current`.
    fn next_fencepost(&self, start: usize, current: u8) -> Option<(usize, u8)> {
        let mut candidate = next_value(current);
        // The counter has at most 254 distinct values
        for _ in 0..u8::MAX {
            if candidate == current {
                break;
            }
            if let Some(pos) = self.find_after(candidate, start) {
                return Some((pos, candidate));
            }
            candidate = next_value(candidate);
        }
        None
    }

    /// Slice the buffer into entry payloads
    pub fn entries(&self, diagnostics: &mut Diagnostics) -> Vec<RawEntry> {
        let mut entries = Vec::new();

        let Some((mut start, mut current)) = self.first_fencepost() else {
            diagnostics.record(
                DiagnosticKind::InvalidEntryHeader,
                None,
                format!(
                    "no fencepost [{:02x} .. {:02x}] found",
                    self.byte0, self.byte2
                ),
            );
            return entries;
        };
        log::debug!("First fencepost at 0x{:x} (value 0x{:02x})", start, current);

        while start < self.data.len() {
            let payload_start = start.saturating_sub(TIMESTAMP_LEAD);

            match self.next_fencepost(start, current) {
                Some((end, value)) => {
                    let payload_end = end.saturating_sub(TIMESTAMP_LEAD).max(payload_start);
                    entries.push(RawEntry {
                        offset: payload_start,
                        length: payload_end - payload_start,
                        body: self.data[payload_start..payload_end].to_vec(),
                    });
                    start = end;
                    current = value;
                }
                None => {
                    // Last entry: nothing follows it within reach
                    let payload_end = (start + MAX_ENTRY_GAP).min(self.data.len());
                    entries.push(RawEntry {
                        offset: payload_start,
                        length: payload_end - payload_start,
                        body: self.data[payload_start..payload_end].to_vec(),
                    });
                    break;
                }
            }
        }

        log::info!("{} fencepost entries found", entries.len());
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const B0: u8 = 0xC1;
    const B2: u8 = 0xC3;

    /// A buffer with a header carrying the fencepost bytes, followed by entries
    fn buffer_with(entries: &[(u8, &[u8])]) -> Vec<u8> {
        let mut data = vec![0x11u8; 0x20];
        data[FENCEPOST_BYTE0_OFFSET] = B0;
        data[FENCEPOST_BYTE0_OFFSET + 1] = 0x00;
        data[FENCEPOST_BYTE2_OFFSET] = B2;
        for (value, message) in entries {
            data.extend_from_slice(&0x5C00_0000u32.to_be_bytes());
            data.extend_from_slice(&[B0, *value, B2]);
            data.extend_from_slice(message);
            data.push(0);
        }
        data
    }

    #[test]
    fn test_next_value_skips_reserved() {
        assert_eq!(next_value(0x01), 0x02);
        assert_eq!(next_value(0xFD), 0xFF);
        assert_eq!(next_value(0xFF), 0x01);
        assert_eq!(next_value(0x00), 0x01);
    }

    #[test]
    fn test_counter_cycle_has_254_values() {
        let mut value = 0x01;
        let mut steps = 0;
        loop {
            value = next_value(value);
            steps += 1;
            if value == 0x01 {
                break;
            }
        }
        assert_eq!(steps, 254);
    }

    #[test]
    fn test_header_is_first_fencepost() {
        let data = buffer_with(&[]);
        let locator = FencepostLocator::new(&data).unwrap();
        // The header bytes themselves form the first [b0, any, b2]
        assert_eq!(locator.first_fencepost(), Some((0x0A, 0x00)));
    }

    #[test]
    fn test_entries_follow_counter() {
        let data = buffer_with(&[(0x01, b"First"), (0x02, b"Second"), (0x03, b"Third")]);
        let locator = FencepostLocator::new(&data).unwrap();
        let entries = locator.entries(&mut Diagnostics::new());

        // Header pseudo-entry, then the three messages
        assert_eq!(entries.len(), 4);
        assert_eq!(&entries[1].body[7..12], b"First");
        assert_eq!(&entries[2].body[7..13], b"Second");
        assert_eq!(&entries[3].body[7..12], b"Third");
        assert_eq!(&entries[1].body[0..4], &0x5C00_0000u32.to_be_bytes());
    }

    #[test]
    fn test_missing_fencepost_is_stepped_over() {
        let data = buffer_with(&[(0x01, b"First"), (0x03, b"Third")]);
        let locator = FencepostLocator::new(&data).unwrap();
        let entries = locator.entries(&mut Diagnostics::new());

        assert_eq!(entries.len(), 3);
        assert_eq!(&entries[2].body[7..12], b"Third");
    }

    #[test]
    fn test_short_buffer_has_no_locator() {
        assert!(FencepostLocator::new(&[0u8; 0x0C]).is_none());
    }

    #[test]
    fn test_fencepost_beyond_gap_is_not_followed() {
        let mut data = buffer_with(&[(0x01, b"one"), (0x03, b"three")]);
        data.extend_from_slice(&[0x11; 400]);
        data.extend_from_slice(&0x5C00_0000u32.to_be_bytes());
        data.extend_from_slice(&[B0, 0x02, B2]);
        data.extend_from_slice(b"two\0");

        let locator = FencepostLocator::new(&data).unwrap();
        let entries = locator.entries(&mut Diagnostics::new());

        // Value 2 lies too far away, so "one" is followed by "three"
        assert_eq!(entries.len(), 3);
        assert_eq!((entries[1].offset, &entries[1].body[7..10]), (32, &b"one"[..]));
        assert_eq!((entries[2].offset, &entries[2].body[7..12]), (43, &b"three"[..]));
        assert_eq!(entries[2].length, MAX_ENTRY_GAP + TIMESTAMP_LEAD);
        assert!(!entries
            .iter()
            .any(|e| e.body.windows(3).any(|w| w == b"two")));
    }

    #[test]
    fn test_search_stops_after_full_counter_cycle() {
        let data = buffer_with(&[(0x05, b"a"), (0x05, b"b")]);
        let locator = FencepostLocator::new(&data).unwrap();
        let first = 0x24;
        assert_eq!(&data[first..first + 3], &[B0, 0x05, B2]);

        // Only the current value follows, which ends the search
        assert_eq!(locator.next_fencepost(first, 0x05), None);

        let entries = locator.entries(&mut Diagnostics::new());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].offset, first - TIMESTAMP_LEAD);
        assert_eq!(entries[1].body.len(), data.len() - entries[1].offset);
    }
}
