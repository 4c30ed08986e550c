//! Message type registry
//!
//! Maps the one-byte type code of a binary entry to its decoder. Every
//! decoder reads fixed offsets from the unescaped payload (the bytes after the
//! type code and timestamp) and produces an event name, structured fields and
//! the legacy condition text. Codes without a decoder go through a generic
//! fallback that dumps the payload with a best-effort interpretation.

use crate::bytes;
use crate::types::{FieldValue, Fields};

pub mod bms;
pub mod mbb;
pub mod text;

/// Output of one message decoder
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub event: String,
    pub fields: Option<Fields>,
    pub conditions: Option<String>,
}

impl DecodedMessage {
    /// A message that is nothing but an event name
    pub fn event(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            fields: None,
            conditions: None,
        }
    }

    pub fn with_conditions(mut self, conditions: impl Into<String>) -> Self {
        self.conditions = Some(conditions.into());
        self
    }

    pub fn with_fields(mut self, fields: Fields) -> Self {
        self.fields = Some(fields);
        self
    }
}

/// Build a field map from name/value pairs
pub(crate) fn fields<const N: usize>(pairs: [(&str, FieldValue); N]) -> Fields {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// A registered decoder got fewer bytes than its layout needs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{name} (type 0x{type_code:02x}) needs {expected} payload bytes, got {actual}")]
pub struct PayloadTooShort {
    pub type_code: u8,
    pub name: &'static str,
    pub expected: usize,
    pub actual: usize,
}

impl PayloadTooShort {
    /// The reduced record emitted in place of the full decode
    pub fn reduced_message(&self) -> DecodedMessage {
        DecodedMessage::event(self.name).with_conditions(format!(
            "Insufficient data ({} of {} bytes)",
            self.actual, self.expected
        ))
    }
}

/// Binary entry types with a dedicated decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    BoardStatus,
    DischargeLevel,
    ChargeFull,
    BmsUnknownType5,
    DischargeLow,
    SystemState,
    KeyState,
    SocAdjustedForVoltage,
    CurrentSensorZeroed,
    BmsUnknownType14,
    HibernateState,
    ChassisIsolationFault,
    BmsReflash,
    CanNodeIdChanged,
    ContactorState,
    DischargeCutback,
    ContactorDrive,
    MbbUnknownType28,
    MbbUnknownType38,
    BatteryCanLinkUp,
    BatteryCanLinkDown,
    SevconCanLinkUp,
    SevconCanLinkDown,
    RidingStatus,
    ChargingStatus,
    SevconStatus,
    ChargerStatus,
    BatteryModuleStatus,
    PowerState,
    SevconPowerState,
    BtRxBufferOverflow,
    BluetoothState,
    DischargeCurrentLimited,
    LowChassisIsolation,
    PrechargeDecayTooSteep,
    DisarmedStatus,
    ModuleContactorClosed,
    VehicleStateTelemetry,
    SensorData,
    DebugString,
}

impl MessageType {
    pub fn from_code(code: u8) -> Option<Self> {
        use MessageType::*;
        Some(match code {
            0x01 => BoardStatus,
            0x03 => DischargeLevel,
            0x04 => ChargeFull,
            0x05 => BmsUnknownType5,
            0x06 => DischargeLow,
            0x08 => SystemState,
            0x09 => KeyState,
            0x0B => SocAdjustedForVoltage,
            0x0D => CurrentSensorZeroed,
            0x0E => BmsUnknownType14,
            0x10 => HibernateState,
            0x11 => ChassisIsolationFault,
            0x12 => BmsReflash,
            0x13 => CanNodeIdChanged,
            0x15 => ContactorState,
            0x16 => DischargeCutback,
            0x18 => ContactorDrive,
            0x1C => MbbUnknownType28,
            0x26 => MbbUnknownType38,
            0x28 => BatteryCanLinkUp,
            0x29 => BatteryCanLinkDown,
            0x2A => SevconCanLinkUp,
            0x2B => SevconCanLinkDown,
            0x2C => RidingStatus,
            0x2D => ChargingStatus,
            0x2F => SevconStatus,
            0x30 => ChargerStatus,
            0x33 => BatteryModuleStatus,
            0x34 => PowerState,
            0x36 => SevconPowerState,
            0x37 => BtRxBufferOverflow,
            0x38 => BluetoothState,
            0x39 => DischargeCurrentLimited,
            0x3A => LowChassisIsolation,
            0x3B => PrechargeDecayTooSteep,
            0x3C => DisarmedStatus,
            0x3D => ModuleContactorClosed,
            0x51 => VehicleStateTelemetry,
            0x54 => SensorData,
            0xFD => DebugString,
            _ => return None,
        })
    }

    pub fn code(&self) -> u8 {
        use MessageType::*;
        match self {
            BoardStatus => 0x01,
            DischargeLevel => 0x03,
            ChargeFull => 0x04,
            BmsUnknownType5 => 0x05,
            DischargeLow => 0x06,
            SystemState => 0x08,
            KeyState => 0x09,
            SocAdjustedForVoltage => 0x0B,
            CurrentSensorZeroed => 0x0D,
            BmsUnknownType14 => 0x0E,
            HibernateState => 0x10,
            ChassisIsolationFault => 0x11,
            BmsReflash => 0x12,
            CanNodeIdChanged => 0x13,
            ContactorState => 0x15,
            DischargeCutback => 0x16,
            ContactorDrive => 0x18,
            MbbUnknownType28 => 0x1C,
            MbbUnknownType38 => 0x26,
            BatteryCanLinkUp => 0x28,
            BatteryCanLinkDown => 0x29,
            SevconCanLinkUp => 0x2A,
            SevconCanLinkDown => 0x2B,
            RidingStatus => 0x2C,
            ChargingStatus => 0x2D,
            SevconStatus => 0x2F,
            ChargerStatus => 0x30,
            BatteryModuleStatus => 0x33,
            PowerState => 0x34,
            SevconPowerState => 0x36,
            BtRxBufferOverflow => 0x37,
            BluetoothState => 0x38,
            DischargeCurrentLimited => 0x39,
            LowChassisIsolation => 0x3A,
            PrechargeDecayTooSteep => 0x3B,
            DisarmedStatus => 0x3C,
            ModuleContactorClosed => 0x3D,
            VehicleStateTelemetry => 0x51,
            SensorData => 0x54,
            DebugString => 0xFD,
        }
    }

    /// Descriptive name of the entry type
    pub fn name(&self) -> &'static str {
        use MessageType::*;
        match self {
            BoardStatus => "Board Status",
            DischargeLevel => "BMS Discharge Level",
            ChargeFull => "BMS Charge Full",
            BmsUnknownType5 => "BMS Unknown Type 5",
            DischargeLow => "BMS Discharge Low",
            SystemState => "BMS System State",
            KeyState => "Key State",
            SocAdjustedForVoltage => "BMS SOC Adjusted for Voltage",
            CurrentSensorZeroed => "BMS Current Sensor Zeroed",
            BmsUnknownType14 => "BMS Unknown Type 14",
            HibernateState => "BMS Hibernate State",
            ChassisIsolationFault => "BMS Chassis Isolation Fault",
            BmsReflash => "BMS Reflash",
            CanNodeIdChanged => "BMS CAN Node ID Changed",
            ContactorState => "BMS Contactor State",
            DischargeCutback => "BMS Discharge Cutback",
            ContactorDrive => "BMS Contactor Drive",
            MbbUnknownType28 => "MBB Unknown Type 28",
            MbbUnknownType38 => "MBB Unknown Type 38",
            BatteryCanLinkUp => "Battery CAN Link Up",
            BatteryCanLinkDown => "Battery CAN Link Down",
            SevconCanLinkUp => "Sevcon CAN Link Up",
            SevconCanLinkDown => "Sevcon CAN Link Down",
            RidingStatus => "Riding Status",
            ChargingStatus => "Charging Status",
            SevconStatus => "Sevcon Status",
            ChargerStatus => "Charger Status",
            BatteryModuleStatus => "Battery Module Status",
            PowerState => "Power State",
            SevconPowerState => "Sevcon Power State",
            BtRxBufferOverflow => "MBB BT RX Buffer Overflow",
            BluetoothState => "Bluetooth State",
            DischargeCurrentLimited => "Battery Discharge Current Limited",
            LowChassisIsolation => "Low Chassis Isolation",
            PrechargeDecayTooSteep => "Precharge Decay Too Steep",
            DisarmedStatus => "Disarmed Status",
            ModuleContactorClosed => "Battery Module Contactor Closed",
            VehicleStateTelemetry => "Vehicle State Telemetry",
            SensorData => "Sensor Data",
            DebugString => "Debug String",
        }
    }

    /// Payload bytes the decoder reads; shorter payloads get a reduced record
    pub fn min_payload_len(&self) -> usize {
        use MessageType::*;
        match self {
            BmsUnknownType5 | BmsUnknownType14 | MbbUnknownType28 | MbbUnknownType38
            | BtRxBufferOverflow | SevconCanLinkUp | SevconCanLinkDown | BluetoothState
            | PrechargeDecayTooSteep | DebugString => 0,
            BoardStatus | SystemState | KeyState | HibernateState | BmsReflash
            | DischargeCutback | BatteryCanLinkUp | BatteryCanLinkDown | SevconPowerState
            | ModuleContactorClosed => 1,
            CanNodeIdChanged | ChargerStatus | PowerState => 2,
            CurrentSensorZeroed | ChassisIsolationFault | SevconStatus | LowChassisIsolation => 5,
            DischargeCurrentLimited => 7,
            ContactorDrive => 0x0A,
            SocAdjustedForVoltage => 0x0C,
            ContactorState => 0x0D,
            ChargingStatus => 0x0E,
            ChargeFull | DischargeLow => 0x0F,
            DischargeLevel | BatteryModuleStatus => 0x14,
            RidingStatus | DisarmedStatus => 0x1B,
            SensorData => 22,
            VehicleStateTelemetry => 68,
        }
    }
}

/// Descriptive name for any type code, registered or not
pub fn describe(code: u8) -> String {
    if let Some(kind) = MessageType::from_code(code) {
        return kind.name().to_string();
    }
    let name = match code {
        0x00 => "Board Status",
        0x02 => "High Throttle Disable",
        0x1E => "MBB Unknown Type 30",
        0x1F => "MBB Unknown Type 31",
        0x20 => "MBB Unknown Type 32",
        0x31 => "MBB BMS Isolation Fault",
        0x35 => "MBB Unknown Type 53",
        0x3E => "Cell Voltages",
        0x52 => "Unknown Type 82",
        0xFB => "System Information",
        other => return format!("Unknown Type {}", other),
    };
    name.to_string()
}

/// Stateless dispatcher from type code to decoder
pub struct MessageDecoder;

impl MessageDecoder {
    /// Decode one binary entry payload
    ///
    /// # Arguments
    /// * `type_code` - First byte of the unescaped entry body
    /// * `payload` - Bytes after the type code and timestamp
    ///
    /// # Returns
    /// * `Ok(DecodedMessage)` for registered codes and for the generic fallback
    /// * `Err(PayloadTooShort)` when a registered decoder lacks bytes; the
    ///   caller emits [`PayloadTooShort::reduced_message`] instead
    pub fn decode(type_code: u8, payload: &[u8]) -> Result<DecodedMessage, PayloadTooShort> {
        let Some(kind) = MessageType::from_code(type_code) else {
            log::trace!("No decoder for type 0x{:02x}, using fallback", type_code);
            return Ok(Self::fallback(type_code, payload));
        };

        let expected = kind.min_payload_len();
        if payload.len() < expected {
            return Err(PayloadTooShort {
                type_code,
                name: kind.name(),
                expected,
                actual: payload.len(),
            });
        }

        use MessageType::*;
        let message = match kind {
            BoardStatus => bms::board_status(payload),
            DischargeLevel => bms::discharge_level(payload),
            ChargeFull => bms::charge_full(payload),
            DischargeLow => bms::discharge_low(payload),
            SystemState => bms::system_state(payload),
            SocAdjustedForVoltage => bms::soc_adjusted_for_voltage(payload),
            CurrentSensorZeroed => bms::current_sensor_zeroed(payload),
            HibernateState => bms::hibernate_state(payload),
            ChassisIsolationFault => bms::isolation_fault(payload),
            BmsReflash => bms::reflash(payload),
            CanNodeIdChanged => bms::can_node_id_changed(payload),
            ContactorState => bms::contactor_state(payload),
            DischargeCutback => bms::discharge_cutback(payload),
            ContactorDrive => bms::contactor_drive(payload),
            BmsUnknownType5 | BmsUnknownType14 | MbbUnknownType28 | MbbUnknownType38 => {
                undeciphered(kind.name(), "Unknown", payload)
            }
            BtRxBufferOverflow => undeciphered(kind.name(), "Data", payload),
            KeyState => mbb::key_state(payload),
            BatteryCanLinkUp => mbb::battery_can_link(payload, true),
            BatteryCanLinkDown => mbb::battery_can_link(payload, false),
            SevconCanLinkUp => DecodedMessage::event("Sevcon CAN Link Up"),
            SevconCanLinkDown => DecodedMessage::event("Sevcon CAN Link Down"),
            RidingStatus => mbb::riding_status(payload),
            ChargingStatus => mbb::charging_status(payload),
            SevconStatus => mbb::sevcon_status(payload),
            ChargerStatus => mbb::charger_status(payload),
            BatteryModuleStatus => mbb::battery_module_status(payload),
            PowerState => mbb::power_state(payload),
            SevconPowerState => mbb::sevcon_power_state(payload),
            BluetoothState => DecodedMessage::event("BT RX buffer reset"),
            DischargeCurrentLimited => mbb::discharge_current_limited(payload),
            LowChassisIsolation => mbb::low_chassis_isolation(payload),
            PrechargeDecayTooSteep => {
                DecodedMessage::event("Precharge Decay Too Steep. Restarting Sevcon.")
            }
            DisarmedStatus => mbb::disarmed_status(payload),
            ModuleContactorClosed => mbb::module_contactor_closed(payload),
            VehicleStateTelemetry => mbb::vehicle_state_telemetry(payload),
            SensorData => mbb::sensor_data(payload),
            DebugString => text::debug_string(payload),
        };

        Ok(message)
    }

    /// Generic decode for codes without a dedicated decoder
    pub fn fallback(type_code: u8, payload: &[u8]) -> DecodedMessage {
        let description = describe(type_code);
        if payload.is_empty() {
            return DecodedMessage::event(description).with_conditions("No additional data");
        }

        let mut conditions = format!("Raw data: {}", bytes::hex_dump(payload));
        match payload.len() {
            1 => conditions.push_str(&format!(" (decimal: {})", payload[0])),
            2 => {
                let word = bytes::read_u16(payload, 0);
                conditions.push_str(&format!(" (decimal: {}, 0x{:04X})", word, word));
                if word == 0x550A || word == 0x553A {
                    conditions.push_str(&format!(" [Possible reference: 0x{:04X}]", word));
                }
            }
            4 => {
                let dword = bytes::read_u32(payload, 0);
                conditions.push_str(&format!(" (decimal: {}, 0x{:08X})", dword, dword));
            }
            _ => {}
        }

        if let Some(text) = ascii_text(payload) {
            conditions.push_str(&format!(" [ASCII: \"{}\"]", text));
        }

        DecodedMessage::event(description).with_conditions(conditions)
    }
}

/// Payload as text when it is plain printable ASCII (trailing NULs ignored)
fn ascii_text(payload: &[u8]) -> Option<String> {
    if !payload.is_ascii() {
        return None;
    }
    let end = payload.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
    let text = &payload[..end];
    let printable = text.iter().all(|b| b.is_ascii_graphic() || *b == b' ');
    (printable && text.len() > 1).then(|| String::from_utf8_lossy(text).into_owned())
}

/// Known entry types whose layout has not been worked out: first 16 bytes as hex
fn undeciphered(name: &str, label: &str, payload: &[u8]) -> DecodedMessage {
    let hex = payload
        .iter()
        .take(16)
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ");
    DecodedMessage::event(name).with_conditions(format!("{}: {}", label, hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_codes_round_trip() {
        for code in 0..=u8::MAX {
            if let Some(kind) = MessageType::from_code(code) {
                assert_eq!(kind.code(), code);
            }
        }
        assert_eq!(MessageType::from_code(0x2C), Some(MessageType::RidingStatus));
        assert_eq!(MessageType::from_code(0x02), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(0x2C), "Riding Status");
        assert_eq!(describe(0x02), "High Throttle Disable");
        assert_eq!(describe(0x77), "Unknown Type 119");
    }

    #[test]
    fn test_fallback_empty_payload() {
        let message = MessageDecoder::decode(0x77, &[]).unwrap();
        assert_eq!(message.event, "Unknown Type 119");
        assert_eq!(message.conditions.as_deref(), Some("No additional data"));
        assert!(message.fields.is_none());
    }

    #[test]
    fn test_fallback_scalars() {
        let one = MessageDecoder::fallback(0x77, &[0x2A]);
        assert_eq!(one.conditions.as_deref(), Some("Raw data: 0x2a (decimal: 42)"));

        let two = MessageDecoder::fallback(0x02, &[0x0A, 0x55]);
        assert_eq!(
            two.conditions.as_deref(),
            Some("Raw data: 0x0a 0x55 (decimal: 21770, 0x550A) [Possible reference: 0x550A]")
        );

        let four = MessageDecoder::fallback(0x77, &[0x01, 0x00, 0x00, 0x80]);
        assert_eq!(
            four.conditions.as_deref(),
            Some("Raw data: 0x01 0x00 0x00 0x80 (decimal: 2147483649, 0x80000001)")
        );
    }

    #[test]
    fn test_fallback_ascii() {
        let message = MessageDecoder::fallback(0xFB, b"FW 48\0");
        assert_eq!(message.event, "System Information");
        assert!(message
            .conditions
            .as_deref()
            .unwrap()
            .ends_with(" [ASCII: \"FW 48\"]"));
    }

    #[test]
    fn test_short_payload_is_reduced() {
        let err = MessageDecoder::decode(0x2C, &[0x01, 0x02]).unwrap_err();
        assert_eq!(err.type_code, 0x2C);
        assert_eq!(err.expected, 0x1B);
        assert_eq!(err.actual, 2);

        let reduced = err.reduced_message();
        assert_eq!(reduced.event, "Riding Status");
        assert_eq!(
            reduced.conditions.as_deref(),
            Some("Insufficient data (2 of 27 bytes)")
        );
    }

    #[test]
    fn test_undeciphered_types_dump_hex() {
        let message = MessageDecoder::decode(0x05, &[0xDE, 0xAD, 0xBE, 0xEF]).unwrap();
        assert_eq!(message.event, "BMS Unknown Type 5");
        assert_eq!(message.conditions.as_deref(), Some("Unknown: de ad be ef"));

        let message = MessageDecoder::decode(0x37, &[0x01]).unwrap();
        assert_eq!(message.conditions.as_deref(), Some("Data: 01"));
    }

    #[test]
    fn test_fixed_events() {
        assert_eq!(MessageDecoder::decode(0x2A, &[]).unwrap().event, "Sevcon CAN Link Up");
        assert_eq!(MessageDecoder::decode(0x38, &[]).unwrap().event, "BT RX buffer reset");
    }
}
