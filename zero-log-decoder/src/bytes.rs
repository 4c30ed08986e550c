//! Byte primitives and the entry escape codec
//!
//! Every typed read here is little-endian and bounds-safe: bytes past the end of
//! the buffer read as zero, so a truncated tail never panics and never errors.
//! Callers that care about short payloads check lengths themselves.

use crate::types::FieldValue;
use byteorder::{ByteOrder, LittleEndian};

/// First byte of every length-prefixed entry
pub const ENTRY_HEADER: u8 = 0xB2;

/// Escape marker inside entry bodies
pub const ESCAPE_MARKER: u8 = 0xFE;

/// Fixed-width field kinds understood by [`read`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Bool,
}

impl FieldKind {
    /// Width of the field in bytes
    pub fn width(&self) -> usize {
        match self {
            FieldKind::U8 | FieldKind::I8 | FieldKind::Bool => 1,
            FieldKind::U16 | FieldKind::I16 => 2,
            FieldKind::U32 | FieldKind::I32 | FieldKind::F32 => 4,
            FieldKind::U64 | FieldKind::I64 | FieldKind::F64 => 8,
        }
    }
}

/// Copy `N` bytes starting at `offset`, zero-filling anything past the end
fn padded<const N: usize>(buf: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    if let Some(available) = buf.get(offset..) {
        let n = available.len().min(N);
        out[..n].copy_from_slice(&available[..n]);
    }
    out
}

pub fn read_u8(buf: &[u8], offset: usize) -> u8 {
    buf.get(offset).copied().unwrap_or(0)
}

pub fn read_i8(buf: &[u8], offset: usize) -> i8 {
    read_u8(buf, offset) as i8
}

pub fn read_bool(buf: &[u8], offset: usize) -> bool {
    read_u8(buf, offset) != 0
}

pub fn read_u16(buf: &[u8], offset: usize) -> u16 {
    LittleEndian::read_u16(&padded::<2>(buf, offset))
}

pub fn read_i16(buf: &[u8], offset: usize) -> i16 {
    LittleEndian::read_i16(&padded::<2>(buf, offset))
}

pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&padded::<4>(buf, offset))
}

pub fn read_i32(buf: &[u8], offset: usize) -> i32 {
    LittleEndian::read_i32(&padded::<4>(buf, offset))
}

pub fn read_u64(buf: &[u8], offset: usize) -> u64 {
    LittleEndian::read_u64(&padded::<8>(buf, offset))
}

pub fn read_i64(buf: &[u8], offset: usize) -> i64 {
    LittleEndian::read_i64(&padded::<8>(buf, offset))
}

pub fn read_f32(buf: &[u8], offset: usize) -> f32 {
    LittleEndian::read_f32(&padded::<4>(buf, offset))
}

pub fn read_f64(buf: &[u8], offset: usize) -> f64 {
    LittleEndian::read_f64(&padded::<8>(buf, offset))
}

/// Read a field of the given kind at `offset`
pub fn read(kind: FieldKind, buf: &[u8], offset: usize) -> FieldValue {
    match kind {
        FieldKind::U8 => FieldValue::Integer(read_u8(buf, offset) as i64),
        FieldKind::I8 => FieldValue::Integer(read_i8(buf, offset) as i64),
        FieldKind::U16 => FieldValue::Integer(read_u16(buf, offset) as i64),
        FieldKind::I16 => FieldValue::Integer(read_i16(buf, offset) as i64),
        FieldKind::U32 => FieldValue::Integer(read_u32(buf, offset) as i64),
        FieldKind::I32 => FieldValue::Integer(read_i32(buf, offset) as i64),
        // u64 values above i64::MAX keep their bit pattern
        FieldKind::U64 => FieldValue::Integer(read_u64(buf, offset) as i64),
        FieldKind::I64 => FieldValue::Integer(read_i64(buf, offset)),
        FieldKind::F32 => FieldValue::Float(read_f32(buf, offset) as f64),
        FieldKind::F64 => FieldValue::Float(read_f64(buf, offset)),
        FieldKind::Bool => FieldValue::Boolean(read_bool(buf, offset)),
    }
}

/// Read up to `count` bytes as text, stopping at the first NUL
///
/// Bytes that are not valid UTF-8 are dropped rather than replaced.
pub fn read_str(buf: &[u8], offset: usize, count: usize) -> String {
    let end = offset.saturating_add(count).min(buf.len());
    let raw = buf.get(offset..end).unwrap_or(&[]);
    let raw = raw.split(|b| *b == 0).next().unwrap_or(&[]);
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}

/// Read up to `count` bytes as Latin-1 text, stopping at the first NUL
pub fn read_latin1(buf: &[u8], offset: usize, count: usize) -> String {
    let end = offset.saturating_add(count).min(buf.len());
    buf.get(offset..end)
        .unwrap_or(&[])
        .iter()
        .take_while(|b| **b != 0)
        .map(|b| *b as char)
        .collect()
}

/// Python-style `string.printable`: ASCII letters, digits, punctuation, whitespace
pub fn is_printable_char(c: char) -> bool {
    c.is_ascii_graphic() || matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

pub fn is_printable(text: &str) -> bool {
    text.chars().all(is_printable_char)
}

/// Space-separated `0x..` rendering of a byte slice
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Find the first occurrence of `needle` in `haystack` at or after `from`
pub fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Outcome of unescaping one entry body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unescaped {
    pub data: Vec<u8>,
    /// Number of two-byte sequences that were collapsed
    pub sequences: usize,
    /// True when a marker was left dangling at the very end
    pub dangling_marker: bool,
}

/// Remove escape sequences from an entry body
///
/// Each `0xFE, X` pair collapses into the single byte `0xFE ^ (X - 1)`.
/// Scanning resumes right after the replaced byte, so the result is never
/// longer than the input. A marker in the final position has no successor
/// and is kept as-is.
pub fn unescape_block(block: &[u8]) -> Unescaped {
    let mut data = Vec::with_capacity(block.len());
    let mut sequences = 0;
    let mut dangling_marker = false;
    let mut i = 0;

    while i < block.len() {
        let byte = block[i];
        if byte == ESCAPE_MARKER {
            match block.get(i + 1) {
                Some(next) => {
                    data.push(byte ^ next.wrapping_sub(1));
                    sequences += 1;
                    i += 2;
                    continue;
                }
                None => dangling_marker = true,
            }
        }
        data.push(byte);
        i += 1;
    }

    Unescaped {
        data,
        sequences,
        dangling_marker,
    }
}
