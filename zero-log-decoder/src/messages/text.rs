//! Free-text entries
//!
//! Two kinds of entries carry text instead of a binary layout: the 0xFD
//! debug string of length-prefixed logs, and every Rev2 fencepost entry.
//! Rev2 messages are split into an event name and condition text by a
//! handful of punctuation rules, and recognisable key/value lists in the
//! condition part become structured fields.

use super::DecodedMessage;
use crate::bytes;
use crate::types::{FieldValue, Fields};
use lazy_static::lazy_static;
use regex::Regex;

/// Marker that separates a Rev2 message from its binary tail
const DATA_MARKER: [u8; 2] = [0x00, bytes::ENTRY_HEADER];

/// Offset of the message text inside a Rev2 entry payload
const TEXT_OFFSET: usize = 7;

/// Integer when the text parses as one, text otherwise
fn int_or_text(value: &str) -> FieldValue {
    value
        .parse::<i64>()
        .map(FieldValue::Integer)
        .unwrap_or_else(|_| FieldValue::Text(value.to_string()))
}

/// Millivolt reading as volts, passing unparsable text through
fn millivolts_as_volts(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Integer(mv) => FieldValue::Float(*mv as f64 / 1000.0),
        other => other.clone(),
    }
}

/// Debug string entry (0xFD)
///
/// `SOC:` lines with 11 or more values (or the compact 8-value form) are
/// broken out into charge readings. Anything else is surfaced as the event.
pub fn debug_string(x: &[u8]) -> DecodedMessage {
    let message = bytes::read_str(x, 0, x.len().saturating_sub(1));

    if let Some(fields) = message.strip_prefix("SOC:").and_then(soc_fields) {
        return DecodedMessage::event("SOC Data")
            .with_fields(fields)
            .with_conditions(message);
    }

    if message.is_empty() {
        DecodedMessage::event("Debug String")
    } else {
        DecodedMessage::event(message)
    }
}

fn soc_fields(data: &str) -> Option<Fields> {
    if !data.contains(',') {
        return None;
    }
    let values: Vec<FieldValue> = data.split(',').map(|v| int_or_text(v.trim())).collect();

    let mut fields = Fields::new();
    let mut put = |name: &str, value: FieldValue| {
        fields.insert(name.to_string(), value);
    };

    match values.len() {
        n if n >= 11 => {
            put("soc_raw_1", values[0].clone());
            put("soc_raw_2", values[1].clone());
            put("soc_raw_3", values[2].clone());
            put("pack_voltage_mv", values[3].clone());
            put("pack_voltage_volts", millivolts_as_volts(&values[3]));
            put("soc_percent_1", values[4].clone());
            put("soc_percent_2", values[5].clone());
            put("soc_percent_3", values[6].clone());
            put("balance_count", values[7].clone());
            put("voltage_max", values[8].clone());
            put("voltage_max_volts", millivolts_as_volts(&values[8]));
            put("voltage_min_1", values[9].clone());
            put("voltage_min_1_volts", millivolts_as_volts(&values[9]));
            put("voltage_min_2", values[10].clone());
            put("voltage_min_2_volts", millivolts_as_volts(&values[10]));
            if let Some(current) = values.get(11) {
                put("current_ma", current.clone());
                if let FieldValue::Integer(_) = current {
                    put("current_amps", millivolts_as_volts(current));
                }
            }
        }
        8 => {
            put("soc_raw_1", values[0].clone());
            put("soc_raw_2", values[1].clone());
            put("soc_raw_3", values[2].clone());
            put("pack_voltage_mv", values[3].clone());
            put("pack_voltage_volts", millivolts_as_volts(&values[3]));
            put("soc_percent_1", values[4].clone());
            put("soc_percent_2", values[5].clone());
            put("soc_percent_3", values[6].clone());
            put("balance_or_current", values[7].clone());
        }
        _ => return None,
    }

    Some(fields)
}

/// A decoded Rev2 fencepost entry
#[derive(Debug, Clone, PartialEq)]
pub struct TextEntry {
    /// Big-endian seconds stored in front of the fencepost
    pub raw_timestamp: u32,
    pub message: DecodedMessage,
    /// Hex of the binary tail following the message, if any
    pub uninterpreted: Option<String>,
}

/// Decode one fencepost entry payload
pub fn decode_text_entry(payload: &[u8]) -> TextEntry {
    let raw_timestamp = match payload.get(0..4) {
        Some(ts) => u32::from_be_bytes([ts[0], ts[1], ts[2], ts[3]]),
        None => 0,
    };

    let text = clean(&bytes::read_str(
        payload,
        TEXT_OFFSET,
        payload.len().saturating_sub(TEXT_OFFSET),
    ));

    let uninterpreted = payload
        .windows(DATA_MARKER.len())
        .position(|w| w == DATA_MARKER)
        .map(|pos| &payload[pos + DATA_MARKER.len()..])
        .filter(|tail| !tail.is_empty())
        .map(bytes::hex_dump);

    TextEntry {
        raw_timestamp,
        message: split_message(&text),
        uninterpreted,
    }
}

/// Flatten whitespace and drop control characters
fn clean(text: &str) -> String {
    text.trim()
        .chars()
        .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Ordered key/value pairs; a repeated key keeps its first position
#[derive(Debug, Default)]
struct Pairs(Vec<(String, String)>);

impl Pairs {
    fn insert(&mut self, key: String, value: String) {
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `k: v` joined by commas; a pair with an empty side renders the other
    fn to_conditions(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| match (k.is_empty(), v.is_empty()) {
                (false, false) => format!("{}: {}", k, v),
                (false, true) => k.clone(),
                _ => v.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn to_fields(&self) -> Fields {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), FieldValue::Text(v.clone())))
            .collect()
    }
}

lazy_static! {
    /// `I_(k: v, ...)suffix` or `V_(k: v, ...)suffix`; the last `)` closes the list
    static ref PREFIXED_LIST: Regex = Regex::new(r"^([IV]_)\((.*)\)(.*)").expect("valid pattern");
    /// `from` half of a state change; the last " to " splits it
    static ref FROM_TO: Regex = Regex::new(r"^(.*) to (.*)").expect("valid pattern");
    /// `Event (note)` with no other parentheses before the note closes
    static ref EVENT_WITH_NOTE: Regex = Regex::new(r"^([^()]+) \(([^()]+)\)").expect("valid pattern");
    static ref OLD_NEW: Regex =
        Regex::new(r"Old: 0x([0-9a-fA-F]+) New: 0x([0-9a-fA-F]+)").expect("valid pattern");
}

/// `P(inner)suffix` for the given list prefix
fn parenthesized<'a>(text: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let caps = PREFIXED_LIST.captures(text)?;
    if caps.get(1)?.as_str() != prefix {
        return None;
    }
    Some((caps.get(2)?.as_str(), caps.get(3)?.as_str()))
}

/// Add `prefix + k` pairs for every `k: v` item in a comma list
fn prefixed_pairs(pairs: &mut Pairs, prefix: &str, list: &str, suffix: &str) {
    for part in list.split(", ") {
        if let Some((k, v)) = part.split_once(": ") {
            pairs.insert(format!("{}{}", prefix, k), format!("{}{}", v, suffix));
        }
    }
}

fn event_with_note(text: &str) -> Option<(&str, &str)> {
    let caps = EVENT_WITH_NOTE.captures(text)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// Binary digits of a hex number of any width, without leading zeros
fn hex_bits(hex: &str) -> String {
    let bits: String = hex
        .chars()
        .filter_map(|c| c.to_digit(16))
        .map(|nibble| format!("{:04b}", nibble))
        .collect();
    match bits.trim_start_matches('0') {
        "" => "0".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// `Old: 0x.. New: 0x..` as two binary strings of equal width
fn old_new_bits(text: &str) -> Option<(String, String)> {
    let caps = OLD_NEW.captures(text)?;
    let old = hex_bits(caps.get(1)?.as_str());
    let new = hex_bits(caps.get(2)?.as_str());
    let width = old.len().max(new.len());
    Some((format!("{:0>w$}", old, w = width), format!("{:0>w$}", new, w = width)))
}

/// Split cleaned Rev2 text into event name, condition text and fields
fn split_message(text: &str) -> DecodedMessage {
    let mut event = text.to_string();
    let mut conditions = String::new();
    let mut pairs = Pairs::default();

    if text.chars().count() < 2 {
        event = "Unknown".to_string();
    } else if text.contains(". ") {
        let sentences: Vec<&str> = text.split(". ").collect();
        let last = sentences.len() - 1;
        conditions = sentences[last].to_string();
        event = if sentences.len() > 2 {
            sentences[..last].join(". ")
        } else {
            sentences[0].to_string()
        };
    } else if text.starts_with("I_(") {
        if let Some((list, suffix)) = parenthesized(text, "I_") {
            event = "Current".to_string();
            prefixed_pairs(&mut pairs, "I_", list, suffix);
        }
    } else if let Some((e, c)) = text.split_once(": ") {
        event = e.to_string();
        conditions = c.to_string();
    } else if let Some((e, c)) = text.split_once(" = ") {
        event = e.to_string();
        conditions = c.to_string();
    } else if text.contains(" from ") && text.contains(" to ") {
        if let Some((e, c)) = text.split_once(" from ") {
            event = e.to_string();
            match FROM_TO.captures(c) {
                Some(caps) => {
                    pairs.insert("from".to_string(), caps[1].to_string());
                    pairs.insert("to".to_string(), caps[2].to_string());
                }
                None => conditions = c.to_string(),
            }
        }
    } else if let Some((e, c)) = event_with_note(text) {
        event = e.to_string();
        conditions = c.to_string();
    }

    if conditions.starts_with("V_(") {
        if let Some((list, suffix)) = parenthesized(&conditions, "V_") {
            prefixed_pairs(&mut pairs, "V_", list, suffix.trim_end_matches(','));
            conditions = list.to_string();
        }
    } else if conditions.contains("Old: ") && conditions.contains("New: ") {
        if let Some((old, new)) = old_new_bits(&conditions) {
            pairs.insert("old".to_string(), old);
            pairs.insert("new".to_string(), new);
        }
    } else if conditions.contains(", ") {
        for part in conditions.split(", ").map(str::trim) {
            let (k, v) = match part.split_once(": ") {
                Some(kv) => kv,
                None => {
                    let words: Vec<&str> = part.split(' ').collect();
                    match words.as_slice() {
                        [k, v] => (*k, *v),
                        _ => (part, ""),
                    }
                }
            };
            pairs.insert(k.to_string(), v.to_string());
        }
    }

    let message = DecodedMessage::event(event);
    if !pairs.is_empty() {
        message
            .with_conditions(pairs.to_conditions())
            .with_fields(pairs.to_fields())
    } else if !conditions.is_empty() {
        message.with_conditions(conditions)
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: u32, text: &str) -> Vec<u8> {
        let mut payload = timestamp.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0xC1, 0x05, 0xC3]);
        payload.extend_from_slice(text.as_bytes());
        payload.push(0);
        payload
    }

    #[test]
    fn test_debug_string_plain() {
        assert_eq!(debug_string(b"Hello world\0").event, "Hello world");
        assert_eq!(debug_string(b"\0").event, "Debug String");
    }

    #[test]
    fn test_debug_string_soc_extended() {
        let message = debug_string(b"SOC:100,101,102,116500,80,81,82,3,3350,3300,3310,-1500\0");
        assert_eq!(message.event, "SOC Data");
        assert_eq!(
            message.conditions.as_deref(),
            Some("SOC:100,101,102,116500,80,81,82,3,3350,3300,3310,-1500")
        );

        let fields = message.fields.unwrap();
        assert_eq!(fields["pack_voltage_volts"], FieldValue::Float(116.5));
        assert_eq!(fields["balance_count"], FieldValue::Integer(3));
        assert_eq!(fields["current_amps"], FieldValue::Float(-1.5));
    }

    #[test]
    fn test_debug_string_soc_compact_and_odd() {
        let fields = debug_string(b"SOC:1,2,3,4000,5,6,7,x\0").fields.unwrap();
        assert_eq!(fields["balance_or_current"], FieldValue::from("x"));
        assert_eq!(fields.len(), 9);

        // Neither layout: shown as-is
        let message = debug_string(b"SOC:1,2,3\0");
        assert_eq!(message.event, "SOC:1,2,3");
        assert!(message.fields.is_none());
    }

    #[test]
    fn test_text_entry_timestamp_and_tail() {
        let mut payload = entry(0x5C00_0000, "Boot");
        payload.extend_from_slice(&[0xB2, 0x01, 0x02]);
        let decoded = decode_text_entry(&payload);
        assert_eq!(decoded.raw_timestamp, 0x5C00_0000);
        assert_eq!(decoded.message.event, "Boot");
        assert_eq!(decoded.uninterpreted.as_deref(), Some("0x01 0x02"));

        let decoded = decode_text_entry(&entry(1, "Boot"));
        assert!(decoded.uninterpreted.is_none());
    }

    #[test]
    fn test_split_rules() {
        let split = |text: &str| decode_text_entry(&entry(0, text)).message;

        assert_eq!(split("x").event, "Unknown");

        let m = split("Charger stopped. Reason unknown");
        assert_eq!((m.event.as_str(), m.conditions.as_deref()), ("Charger stopped", Some("Reason unknown")));

        let m = split("Mode: Eco");
        assert_eq!((m.event.as_str(), m.conditions.as_deref()), ("Mode", Some("Eco")));

        let m = split("Limit = 42");
        assert_eq!((m.event.as_str(), m.conditions.as_deref()), ("Limit", Some("42")));

        let m = split("State changed from Idle to Run");
        assert_eq!(m.event, "State changed");
        assert_eq!(m.conditions.as_deref(), Some("from: Idle, to: Run"));

        let m = split("Contactor open (precharge)");
        assert_eq!((m.event.as_str(), m.conditions.as_deref()), ("Contactor open", Some("precharge")));
    }

    #[test]
    fn test_current_fields() {
        let m = decode_text_entry(&entry(0, "I_(a: 1, b: 2)mA")).message;
        assert_eq!(m.event, "Current");
        assert_eq!(m.conditions.as_deref(), Some("I_a: 1mA, I_b: 2mA"));
        assert_eq!(m.fields.unwrap()["I_b"], FieldValue::from("2mA"));
    }

    #[test]
    fn test_condition_structures() {
        let m = decode_text_entry(&entry(0, "Cells: V_(min: 3300, max: 3350)mV,")).message;
        assert_eq!(m.conditions.as_deref(), Some("V_min: 3300mV, V_max: 3350mV"));

        let m = decode_text_entry(&entry(0, "Flags: Old: 0x1 New: 0x6")).message;
        let fields = m.fields.unwrap();
        assert_eq!(fields["old"], FieldValue::from("001"));
        assert_eq!(fields["new"], FieldValue::from("110"));

        let m = decode_text_entry(&entry(0, "Status: temp 30, fan on, ok")).message;
        assert_eq!(m.conditions.as_deref(), Some("temp: 30, fan: on, ok"));
    }

    #[test]
    fn test_parenthesized_forms() {
        let split = |text: &str| decode_text_entry(&entry(0, text)).message;

        let m = split("I_(x)y");
        assert_eq!(m.event, "Current");
        assert!(m.conditions.is_none());

        // No closing parenthesis: the text stays the event
        assert_eq!(split("I_(a: 1").event, "I_(a: 1");

        let m = split("A (b)");
        assert_eq!((m.event.as_str(), m.conditions.as_deref()), ("A", Some("b")));

        let m = split("Fault (a (b))");
        assert_eq!(m.event, "Fault (a (b))");
        assert!(m.conditions.is_none());

        let m = split("Moved from a to b to c");
        assert_eq!(m.conditions.as_deref(), Some("from: a to b, to: c"));
    }

    #[test]
    fn test_old_new_wider_than_64_bits() {
        let m = decode_text_entry(&entry(0, "Mask: Old: 0x100000000000000000 New: 0x3")).message;
        let fields = m.fields.unwrap();
        let old = fields["old"].as_str().unwrap();
        let new = fields["new"].as_str().unwrap();
        assert_eq!(old.len(), 69);
        assert_eq!(new.len(), 69);
        assert!(old.starts_with('1') && old[1..].chars().all(|c| c == '0'));
        assert!(new.ends_with("11") && new[..67].chars().all(|c| c == '0'));

        assert_eq!(hex_bits("0"), "0");
        assert_eq!(hex_bits("0a"), "1010");
    }
}
