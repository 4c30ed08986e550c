//! Length-prefixed entry window (Rev0, Rev1 and the Rev3 ring buffer)
//!
//! The active entry region is found through a directory marker that stores the
//! logical end, start and a claimed entry count. When start is not before end
//! the region wraps around the end of the ring, so the window is kept as two
//! borrowed slices and read through logical offsets instead of being copied.
//!
//! Entry framing inside the window:
//!
//! ```text
//! B2 <len> <type> <ts0 ts1 ts2 ts3> <payload ...>
//! ^-------- len bytes in total --------------^
//! ```
//!
//! Everything after the length byte is escaped and must go through
//! [`unescape_block`] before any field is read.

use super::RawEntry;
use crate::bytes::{self, unescape_block, ENTRY_HEADER};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::types::Revision;

/// Marker of the ring-buffer directory
pub const DIRECTORY_MARKER: [u8; 4] = [0xA2; 4];

/// Entries start this far past the directory marker in legacy logs
const DIRECTORY_SIZE: usize = 0x10;

/// Header byte, length byte, type byte and a 4-byte timestamp
pub const MIN_ENTRY_LENGTH: usize = 7;

/// The active entry region of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryWindow<'a> {
    head: &'a [u8],
    tail: &'a [u8],
    /// Entry count stored in the directory, advisory only
    pub claimed_count: Option<u32>,
}

impl<'a> EntryWindow<'a> {
    /// A window over one contiguous slice
    pub fn contiguous(data: &'a [u8]) -> Self {
        Self {
            head: data,
            tail: &[],
            claimed_count: None,
        }
    }

    /// Locate the window for a length-prefixed revision
    pub fn locate(data: &'a [u8], revision: Revision) -> Self {
        let Some(marker) = bytes::find(data, &DIRECTORY_MARKER, 0) else {
            let start = data
                .iter()
                .position(|b| *b == ENTRY_HEADER)
                .unwrap_or(data.len());
            log::debug!("No directory marker, scanning from first entry header at 0x{:x}", start);
            return Self::contiguous(&data[start..]);
        };

        let end = bytes::read_u32(data, marker + 0x4) as usize;
        let start = bytes::read_u32(data, marker + 0x8) as usize;
        let claimed = bytes::read_u32(data, marker + 0xC);
        log::info!(
            "Entry directory at 0x{:x}: start=0x{:x}, end=0x{:x}, count={}",
            marker,
            start,
            end,
            claimed
        );

        let len = data.len();
        let clamp = |offset: usize| offset.min(len);

        let (head, tail) = if start >= end {
            // Ring-buffer logs wrap to the very beginning of the file
            let wrap_to = match revision {
                Revision::Rev3 => 0,
                _ => marker + DIRECTORY_SIZE,
            };
            let tail_start = clamp(wrap_to.min(end));
            (&data[clamp(start)..], &data[tail_start..clamp(end)])
        } else {
            (&data[clamp(start)..clamp(end)], &data[0..0])
        };

        Self {
            head,
            tail,
            claimed_count: Some(claimed),
        }
    }

    pub fn len(&self) -> usize {
        self.head.len() + self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the window spans the end of the ring
    pub fn wraps(&self) -> bool {
        !self.tail.is_empty()
    }

    /// Byte at a logical offset
    pub fn get(&self, offset: usize) -> Option<u8> {
        if offset < self.head.len() {
            Some(self.head[offset])
        } else {
            self.tail.get(offset - self.head.len()).copied()
        }
    }

    /// Copy out a logical range, clamped to the window
    pub fn copy_range(&self, start: usize, end: usize) -> Vec<u8> {
        let end = end.min(self.len());
        let start = start.min(end);
        let split = self.head.len();
        let mut out = Vec::with_capacity(end - start);
        if start < split {
            out.extend_from_slice(&self.head[start..end.min(split)]);
        }
        if end > split {
            out.extend_from_slice(&self.tail[start.max(split) - split..end - split]);
        }
        out
    }

    /// Number of entry header bytes in the window
    pub fn count_entry_headers(&self) -> usize {
        self.head
            .iter()
            .chain(self.tail.iter())
            .filter(|b| **b == ENTRY_HEADER)
            .count()
    }

    /// Scan the window left to right for length-prefixed entries
    ///
    /// Every step advances at least one byte. Bytes that do not start an entry
    /// are skipped; a header with an unusable length is skipped by one byte so
    /// a corrupt length never hides the entries behind it.
    pub fn scan(&self, diagnostics: &mut Diagnostics) -> Vec<RawEntry> {
        let mut entries = Vec::new();
        let mut skipped_from: Option<usize> = None;
        let mut offset = 0;
        let len = self.len();

        while offset < len {
            if self.get(offset) != Some(ENTRY_HEADER) {
                skipped_from.get_or_insert(offset);
                offset += 1;
                continue;
            }
            flush_skipped(&mut skipped_from, offset, diagnostics);

            let length = self.get(offset + 1).unwrap_or(0) as usize;
            if length < MIN_ENTRY_LENGTH || offset + length > len {
                diagnostics.record(
                    DiagnosticKind::TruncatedEntry,
                    Some(offset),
                    format!("declared length {} unusable ({} bytes left)", length, len - offset),
                );
                offset += 1;
                continue;
            }

            let unescaped = unescape_block(&self.copy_range(offset + 2, offset + length));
            if unescaped.dangling_marker {
                diagnostics.record(
                    DiagnosticKind::UnescapeAnomaly,
                    Some(offset),
                    "escape marker without successor",
                );
            }

            entries.push(RawEntry {
                offset,
                length,
                body: unescaped.data,
            });
            offset += length;
        }
        flush_skipped(&mut skipped_from, len, diagnostics);

        match self.claimed_count {
            Some(claimed) => log::info!("{} entries found ({} claimed)", entries.len(), claimed),
            None => log::info!("{} entries found", entries.len()),
        }

        entries
    }
}

fn flush_skipped(skipped_from: &mut Option<usize>, offset: usize, diagnostics: &mut Diagnostics) {
    if let Some(from) = skipped_from.take() {
        diagnostics.record(
            DiagnosticKind::InvalidEntryHeader,
            Some(from),
            format!("skipped {} bytes without an entry header", offset - from),
        );
    }
}
