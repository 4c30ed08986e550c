//! Format detection and header extraction
//!
//! Classifies a buffer by unit type and revision from weak, offset-based
//! heuristics, then reads the header fields from that revision's offset table.
//! Detection never fails: anything unreadable ends up as [`UNKNOWN`].
//!
//! ## Offset tables
//!
//! | Unit | Rev | VIN | Serial | Firmware | Board | Model |
//! |------|-----|-----|--------|----------|-------|-------|
//! | MBB  | 0   | 0x240 | 0x200 (21) | u16 @0x27B | u16 @0x27D | 0x27F |
//! | MBB  | 1   | 0x252 | 0x210 (13) | u16 @0x266 | u16 @0x268 | 0x26B |
//! | MBB  | 2   | 0x029 (latin-1) | 0x03C (13) | text @0x06B (7) | text @0x05C (8) | 0x019 |
//!
//! All legacy MBB logs keep the initial date at 0x02A. BMS logs carry a version
//! byte at 0x4 and the initial date at 0x12. Ring-buffer (Rev3) MBB logs locate
//! their fields relative to the first-run marker.

use crate::bytes::{self, ENTRY_HEADER};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::types::{HeaderField, LogBuffer, LogHeader, Revision, UnitType, UNKNOWN};

/// Length of a vehicle identifier
pub const VIN_LENGTH: usize = 17;

/// Every Zero VIN starts with this manufacturer prefix
pub const VIN_PREFIX: &str = "538";

/// Marker preceding the first-run date in ring-buffer logs
pub const FIRST_RUN_MARKER: [u8; 4] = [0xA1; 4];

/// Total size of a ring-buffer MBB log
pub const RING_BUFFER_SIZE: usize = 0x40000;

const BMS_VERSION_OFFSET: usize = 0x4;
const BMS_VERSION_REV0: u8 = 0xB6;
const BMS_VERSION_REV1: u8 = 0xDE;
const BMS_VERSION_REV2: u8 = 0x79;

const DATE_LENGTH: usize = 20;

/// Offset of the serial number relative to the first-run marker
const RING_SERIAL_OFFSET: usize = 0x302;
const RING_SERIAL_LENGTH: usize = 15;
const RING_SERIAL_FALLBACKS: [usize; 3] = [0x3BD10, 0x3BD00, 0x3BD20];

/// Where the unit type probes look for "MBB" / "BMS"
const UNIT_PROBE_OFFSETS: [usize; 2] = [0x000, 0x00D];

/// Result of format detection
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedFormat {
    pub unit_type: UnitType,
    pub revision: Revision,
    pub header: LogHeader,
}

/// Whether a string looks like a Zero VIN
pub fn is_vin(candidate: &str) -> bool {
    bytes::is_printable(candidate)
        && candidate.chars().count() == VIN_LENGTH
        && candidate.starts_with(VIN_PREFIX)
}

/// VIN embedded in a file name, if there is one
///
/// The 17 characters starting at the first "538" of a base name longer than
/// a VIN.
pub fn filename_vin(file_name: &str) -> Option<String> {
    if file_name.chars().count() <= VIN_LENGTH {
        return None;
    }
    let index = file_name.find(VIN_PREFIX)?;
    Some(file_name[index..].chars().take(VIN_LENGTH).collect())
}

/// Classify the unit that wrote the buffer
///
/// File name hints win; otherwise the two in-buffer probes are tried in order.
pub fn detect_unit_type(buffer: &LogBuffer) -> UnitType {
    let name = buffer.file_name().to_uppercase();
    if name.contains("MBB") {
        return UnitType::MainBoard;
    }
    if name.contains("BMS") {
        return UnitType::BatteryManagement;
    }

    for offset in UNIT_PROBE_OFFSETS {
        match printable_probe(buffer.data(), offset, 3).as_deref() {
            Some("MBB") => return UnitType::MainBoard,
            Some("BMS") => return UnitType::BatteryManagement,
            _ => {}
        }
    }

    UnitType::Unknown
}

/// Detect unit type and revision, and read the header
pub fn detect_format(buffer: &LogBuffer, diagnostics: &mut Diagnostics) -> DetectedFormat {
    let unit_type = detect_unit_type(buffer);
    log::debug!("{}: unit type {}", buffer.label(), unit_type);

    let (revision, header) = match unit_type {
        UnitType::BatteryManagement => read_bms_header(buffer.data()),
        UnitType::MainBoard | UnitType::Unknown => {
            if is_ring_buffer(buffer.data()) {
                (Revision::Rev3, read_ring_buffer_header(buffer))
            } else {
                read_legacy_mbb_header(buffer, unit_type, diagnostics)
            }
        }
    };

    log::info!(
        "{}: detected {} {} ({} header fields)",
        buffer.label(),
        unit_type,
        revision,
        header.len()
    );

    DetectedFormat {
        unit_type,
        revision,
        header,
    }
}

/// Ring-buffer logs start straight away with an entry, or have the fixed
/// ring size and contain the first-run marker
pub fn is_ring_buffer(data: &[u8]) -> bool {
    data.first() == Some(&ENTRY_HEADER)
        || (data.len() == RING_BUFFER_SIZE && bytes::find(data, &FIRST_RUN_MARKER, 0).is_some())
}

/// `count` bytes at `offset` if they exist and are all printable
fn printable_probe(data: &[u8], offset: usize, count: usize) -> Option<String> {
    let raw = data.get(offset..offset.checked_add(count)?)?;
    let text = String::from_utf8(raw.to_vec()).ok()?;
    bytes::is_printable(&text).then_some(text)
}

fn text_or_unknown(text: String) -> String {
    if text.is_empty() {
        UNKNOWN.to_string()
    } else {
        text
    }
}

fn read_bms_header(data: &[u8]) -> (Revision, LogHeader) {
    let version = bytes::read_u8(data, BMS_VERSION_OFFSET);
    let revision = match version {
        BMS_VERSION_REV0 => Revision::Rev0,
        BMS_VERSION_REV1 => Revision::Rev1,
        BMS_VERSION_REV2 => Revision::Rev2,
        other => {
            log::warn!("Unknown BMS log version 0x{:02x}, assuming {}", other, Revision::Rev2);
            Revision::Rev2
        }
    };

    let mut header = LogHeader::new();
    header.set(
        HeaderField::InitialDate,
        text_or_unknown(bytes::read_str(data, 0x12, DATE_LENGTH)),
    );

    match revision {
        Revision::Rev0 => {
            header.set(HeaderField::BmsSerialNumber, text_or_unknown(bytes::read_str(data, 0x300, 21)));
            header.set(HeaderField::PackSerialNumber, text_or_unknown(bytes::read_str(data, 0x320, 8)));
        }
        Revision::Rev1 => {
            // BMS serial number location is not known for this layout
            header.set(HeaderField::PackSerialNumber, text_or_unknown(bytes::read_str(data, 0x331, 8)));
        }
        _ => {
            header.set(HeaderField::BmsSerialNumber, text_or_unknown(bytes::read_str(data, 0x038, 13)));
            header.set(HeaderField::PackSerialNumber, text_or_unknown(bytes::read_str(data, 0x06C, 7)));
        }
    }

    (revision, header)
}

fn ring_serial_at(data: &[u8], offset: usize) -> Option<String> {
    if offset + RING_SERIAL_LENGTH >= data.len() {
        return None;
    }
    let serial = bytes::read_str(data, offset, RING_SERIAL_LENGTH);
    let serial = serial.trim_matches('\0');
    (serial.len() >= 8 && serial.chars().all(char::is_alphanumeric)).then(|| serial.to_string())
}

fn read_ring_buffer_header(buffer: &LogBuffer) -> LogHeader {
    let data = buffer.data();
    let mut header = LogHeader::new();

    header.set(
        HeaderField::Vin,
        filename_vin(buffer.file_name()).unwrap_or_else(|| UNKNOWN.to_string()),
    );

    let first_run = bytes::find(data, &FIRST_RUN_MARKER, 0);

    let serial = first_run
        .and_then(|idx| ring_serial_at(data, idx + RING_SERIAL_OFFSET))
        .or_else(|| {
            RING_SERIAL_FALLBACKS
                .iter()
                .find_map(|offset| ring_serial_at(data, *offset))
        });
    header.set(HeaderField::SerialNumber, serial.unwrap_or_else(|| UNKNOWN.to_string()));

    let initial_date = first_run
        .map(|idx| bytes::read_str(data, idx + FIRST_RUN_MARKER.len(), DATE_LENGTH))
        .unwrap_or_default();
    header.set(HeaderField::InitialDate, text_or_unknown(initial_date));

    header.set(HeaderField::Model, UNKNOWN);
    header.set(HeaderField::FirmwareRev, UNKNOWN);
    header.set(HeaderField::BoardRev, UNKNOWN);

    header
}

fn read_legacy_mbb_header(
    buffer: &LogBuffer,
    unit_type: UnitType,
    diagnostics: &mut Diagnostics,
) -> (Revision, LogHeader) {
    let data = buffer.data();
    let mut header = LogHeader::new();

    let vin_v0 = bytes::read_str(data, 0x240, VIN_LENGTH);
    let vin_v1 = bytes::read_str(data, 0x252, VIN_LENGTH);
    let vin_v2 = bytes::read_latin1(data, 0x029, VIN_LENGTH);

    let (revision, model_offset) = if is_vin(&vin_v0) {
        header.set(HeaderField::Vin, vin_v0);
        header.set(HeaderField::SerialNumber, text_or_unknown(bytes::read_str(data, 0x200, 21)));
        header.set(HeaderField::FirmwareRev, bytes::read_u16(data, 0x27B).to_string());
        header.set(HeaderField::BoardRev, bytes::read_u16(data, 0x27D).to_string());
        (Revision::Rev0, 0x27F)
    } else if is_vin(&vin_v1) {
        header.set(HeaderField::Vin, vin_v1);
        header.set(HeaderField::SerialNumber, text_or_unknown(bytes::read_str(data, 0x210, 13)));
        header.set(HeaderField::FirmwareRev, bytes::read_u16(data, 0x266).to_string());
        header.set(HeaderField::BoardRev, bytes::read_u16(data, 0x268).to_string());
        (Revision::Rev1, 0x26B)
    } else if is_vin(&vin_v2) {
        header.set(HeaderField::Vin, vin_v2);
        header.set(HeaderField::SerialNumber, text_or_unknown(bytes::read_str(data, 0x03C, 13)));
        header.set(HeaderField::FirmwareRev, text_or_unknown(bytes::read_str(data, 0x06B, 7)));
        header.set(HeaderField::BoardRev, text_or_unknown(bytes::read_str(data, 0x05C, 8)));
        (Revision::Rev2, 0x019)
    } else {
        diagnostics.record(
            DiagnosticKind::UnknownFormat,
            None,
            format!("{}: no VIN found at any known {} header offset", buffer.label(), unit_type),
        );
        // The last probe is the best remaining guess
        let vin = if !vin_v2.is_empty() && bytes::is_printable(&vin_v2) {
            vin_v2
        } else {
            UNKNOWN.to_string()
        };
        header.set(HeaderField::Vin, vin);
        header.set(HeaderField::SerialNumber, UNKNOWN);
        header.set(HeaderField::FirmwareRev, UNKNOWN);
        header.set(HeaderField::BoardRev, UNKNOWN);
        (Revision::Rev0, 0x27F)
    };

    let vin = header.vin().to_string();
    if !bytes::is_printable(&vin) {
        log::warn!("VIN unreadable: {:?}", vin);
    } else if let Some(from_name) = filename_vin(buffer.file_name()) {
        if from_name != vin {
            log::warn!("VIN mismatch: header:{} filename:{}", vin, from_name);
        }
    }

    header.set(HeaderField::Model, text_or_unknown(bytes::read_str(data, model_offset, 3)));
    header.set(
        HeaderField::InitialDate,
        text_or_unknown(bytes::read_str(data, 0x02A, DATE_LENGTH)),
    );

    (revision, header)
}
