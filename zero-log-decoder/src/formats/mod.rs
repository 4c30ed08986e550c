//! Log layouts: format detection and entry window location
//!
//! This module classifies a buffer and slices it into raw entries. Which
//! locator runs depends on the revision: Rev2 logs are delimited by
//! fenceposts, every other revision uses length-prefixed entries.

use crate::bytes;
use crate::diagnostics::Diagnostics;
use crate::types::Revision;

pub mod fencepost;
pub mod header;
pub mod legacy;

// Re-export locator types
pub use fencepost::FencepostLocator;
pub use header::{detect_format, detect_unit_type, filename_vin, is_vin, DetectedFormat};
pub use legacy::EntryWindow;

/// One entry as found by a locator, before it is decoded
///
/// For length-prefixed entries `body` is the unescaped block after the
/// length byte: type code, little-endian timestamp, payload. For fencepost
/// entries it is the raw slice starting at the big-endian timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// Offset of the entry in the scanned region
    pub offset: usize,
    /// Declared (or delimited) length in the scanned region
    pub length: usize,
    pub body: Vec<u8>,
}

impl RawEntry {
    /// Type code of a length-prefixed entry
    pub fn type_code(&self) -> Option<u8> {
        self.body.first().copied()
    }

    /// Little-endian timestamp of a length-prefixed entry
    pub fn raw_timestamp(&self) -> u32 {
        bytes::read_u32(&self.body, 1)
    }

    /// Type-specific payload of a length-prefixed entry
    pub fn payload(&self) -> &[u8] {
        self.body.get(5..).unwrap_or(&[])
    }
}

/// Slice a buffer into raw entries the way its revision lays them out
pub fn locate_entries(data: &[u8], revision: Revision, diagnostics: &mut Diagnostics) -> Vec<RawEntry> {
    if revision.uses_length_prefixed_entries() {
        EntryWindow::locate(data, revision).scan(diagnostics)
    } else {
        match FencepostLocator::new(data) {
            Some(locator) => locator.entries(diagnostics),
            None => {
                log::warn!("Buffer too short to hold fencepost bytes ({} bytes)", data.len());
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_entry_accessors() {
        let entry = RawEntry {
            offset: 0,
            length: 9,
            body: vec![0x2C, 0x01, 0x02, 0x03, 0x04, 0xAA],
        };
        assert_eq!(entry.type_code(), Some(0x2C));
        assert_eq!(entry.raw_timestamp(), 0x0403_0201);
        assert_eq!(entry.payload(), &[0xAA]);

        let short = RawEntry {
            offset: 0,
            length: 2,
            body: vec![0x2C, 0x01],
        };
        assert_eq!(short.raw_timestamp(), 0x01);
        assert!(short.payload().is_empty());
    }

    #[test]
    fn test_locate_dispatches_by_revision() {
        let data = [0xB2, 0x07, 0x00, 0x01, 0x02, 0x03, 0x04];
        let entries = locate_entries(&data, Revision::Rev3, &mut Diagnostics::new());
        assert_eq!(entries.len(), 1);

        let entries = locate_entries(&data, Revision::Rev2, &mut Diagnostics::new());
        assert!(entries.is_empty());
    }
}
