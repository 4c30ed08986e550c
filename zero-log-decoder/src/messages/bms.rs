//! Battery management entry decoders
//!
//! Voltages arrive in millivolts and capacities and currents in micro-units;
//! the structured fields carry converted values while the condition text keeps
//! the layout of the unit's own log output.

use super::{fields, DecodedMessage};
use crate::bytes::{read_bool, read_i32, read_str, read_u16, read_u32, read_u8};
use crate::types::FieldValue;

fn on_off(on: bool) -> &'static str {
    if on {
        "On"
    } else {
        "Off"
    }
}

/// Percentage of `numerator` over `denominator`, zero when undefined
pub(crate) fn ratio_percent(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator * 100.0 / denominator
    }
}

fn bike_mode(code: u8) -> String {
    match code {
        0x01 => "Bike On".to_string(),
        0x02 => "Charge".to_string(),
        0x03 => "Idle".to_string(),
        other => format!("Unknown({})", other),
    }
}

/// Cell and pack readings shared by the discharge and charge entries
struct PackReadings {
    amp_hours: f64,
    soc: u8,
    low_cell_mv: u16,
    high_cell_mv: u16,
    pack_temp: u8,
    bms_temp: u8,
    pack_mv: u32,
}

impl PackReadings {
    fn read(x: &[u8]) -> Self {
        Self {
            amp_hours: (read_u32(x, 0x06) as f64 / 1_000_000.0).trunc(),
            soc: read_u8(x, 0x0A),
            low_cell_mv: read_u16(x, 0x00),
            high_cell_mv: read_u16(x, 0x02),
            pack_temp: read_u8(x, 0x04),
            bms_temp: read_u8(x, 0x05),
            pack_mv: read_u32(x, 0x0B),
        }
    }

    fn balance_mv(&self) -> i64 {
        self.high_cell_mv as i64 - self.low_cell_mv as i64
    }

    fn pack_volts(&self) -> f64 {
        self.pack_mv as f64 / 1000.0
    }

    fn charge_conditions(&self) -> String {
        format!(
            "{:03.0} AH, SOC:{:3}%,         L:{:4.2}V,         H:{:4.2}V, B:{:03}mV, PT:{:03}C, BT:{:03}C, PV:{:6.1}V",
            self.amp_hours,
            self.soc,
            self.low_cell_mv as f64 / 1000.0,
            self.high_cell_mv as f64 / 1000.0,
            self.balance_mv(),
            self.pack_temp,
            self.bms_temp,
            self.pack_volts()
        )
    }

    fn charge_fields(&self, event_type: &str) -> crate::types::Fields {
        fields([
            ("amp_hours", self.amp_hours.into()),
            ("state_of_charge_percent", (self.soc as i64).into()),
            ("voltage_low_cell_volts", (self.low_cell_mv as f64 / 1000.0).into()),
            ("voltage_high_cell_volts", (self.high_cell_mv as f64 / 1000.0).into()),
            ("voltage_balance_mv", self.balance_mv().into()),
            ("pack_temp_celsius", (self.pack_temp as i64).into()),
            ("bms_temp_celsius", (self.bms_temp as i64).into()),
            ("pack_voltage_volts", self.pack_volts().into()),
            ("event_type", event_type.into()),
        ])
    }
}

pub fn board_status(x: &[u8]) -> DecodedMessage {
    let cause = match read_u8(x, 0x00) {
        0x04 => "Software",
        _ => "Unknown",
    };
    DecodedMessage::event("BMS Reset").with_conditions(cause)
}

pub fn discharge_level(x: &[u8]) -> DecodedMessage {
    let pack = PackReadings::read(x);
    let current = (read_i32(x, 0x10) as f64 / 1_000_000.0).trunc();
    let unloaded_cell_mv = read_u16(x, 0x14);
    let mode = bike_mode(read_u8(x, 0x0F));

    let conditions = format!(
        "{:03.0} AH, SOC:{:3}%, I:{:3.0}A, L:{:4.2}V, l:{:4.2}V, H:{:4.2}V, B:{:03}mV, PT:{:03}C, BT:{:03}C, PV:{:6.1}V, M:{}",
        pack.amp_hours,
        pack.soc,
        current,
        pack.low_cell_mv as f64 / 1000.0,
        unloaded_cell_mv as f64 / 1000.0,
        pack.high_cell_mv as f64 / 1000.0,
        pack.balance_mv(),
        pack.pack_temp,
        pack.bms_temp,
        pack.pack_volts(),
        mode
    );

    let fields = fields([
        ("amp_hours", pack.amp_hours.into()),
        ("state_of_charge_percent", (pack.soc as i64).into()),
        ("current_amps", current.into()),
        ("voltage_low_cell_volts", (pack.low_cell_mv as f64 / 1000.0).into()),
        ("voltage_unloaded_cell_volts", (unloaded_cell_mv as f64 / 1000.0).into()),
        ("voltage_high_cell_volts", (pack.high_cell_mv as f64 / 1000.0).into()),
        ("voltage_balance_mv", pack.balance_mv().into()),
        ("pack_temp_celsius", (pack.pack_temp as i64).into()),
        ("bms_temp_celsius", (pack.bms_temp as i64).into()),
        ("pack_voltage_volts", pack.pack_volts().into()),
        ("pack_voltage_mv", (pack.pack_mv as i64).into()),
        ("mode", FieldValue::Text(mode)),
    ]);

    DecodedMessage::event("Discharge level")
        .with_fields(fields)
        .with_conditions(conditions)
}

pub fn charge_full(x: &[u8]) -> DecodedMessage {
    let pack = PackReadings::read(x);
    DecodedMessage::event("Charged To Full")
        .with_fields(pack.charge_fields("charge_complete"))
        .with_conditions(pack.charge_conditions())
}

pub fn discharge_low(x: &[u8]) -> DecodedMessage {
    let pack = PackReadings::read(x);
    DecodedMessage::event("Discharged To Low")
        .with_fields(pack.charge_fields("discharge_low"))
        .with_conditions(pack.charge_conditions())
}

pub fn system_state(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event(format!("System Turned {}", on_off(read_bool(x, 0x00))))
}

pub fn soc_adjusted_for_voltage(x: &[u8]) -> DecodedMessage {
    let old = read_u32(x, 0x00);
    let old_soc = read_u8(x, 0x04);
    let new = read_u32(x, 0x05);
    let new_soc = read_u8(x, 0x09);
    let low = read_u16(x, 0x0A);

    DecodedMessage::event("SOC adjusted for voltage")
        .with_fields(fields([
            ("old_uah", (old as i64).into()),
            ("old_soc_percent", (old_soc as i64).into()),
            ("new_uah", (new as i64).into()),
            ("new_soc_percent", (new_soc as i64).into()),
            ("low_cell_mv", (low as i64).into()),
        ]))
        .with_conditions(format!(
            "old:   {}uAH (soc:{}%), new:   {}uAH (soc:{}%), low cell: {} mV",
            old, old_soc, new, new_soc, low
        ))
}

pub fn current_sensor_zeroed(x: &[u8]) -> DecodedMessage {
    let old = read_u16(x, 0x00);
    let new = read_u16(x, 0x02);
    let correction = read_u8(x, 0x04);
    DecodedMessage::event("Current Sensor Zeroed").with_conditions(format!(
        "old: {}mV, new: {}mV, corrfact: {}",
        old, new, correction
    ))
}

pub fn hibernate_state(x: &[u8]) -> DecodedMessage {
    let entering = read_bool(x, 0x00);
    DecodedMessage::event(if entering {
        "Entering Hibernate"
    } else {
        "Exiting Hibernate"
    })
}

pub fn isolation_fault(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event("Chassis Isolation Fault").with_conditions(format!(
        "{} ohms to cell {}",
        read_u32(x, 0x00),
        read_u8(x, 0x04)
    ))
}

pub fn reflash(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event("BMS Reflash").with_conditions(format!(
        "Revision {}, Built {}",
        read_u8(x, 0x00),
        read_str(x, 0x01, 20)
    ))
}

pub fn can_node_id_changed(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event("Changed CAN Node ID").with_conditions(format!(
        "old: {:02}, new: {:02}",
        read_u8(x, 0x00),
        read_u8(x, 0x01)
    ))
}

pub fn contactor_state(x: &[u8]) -> DecodedMessage {
    let closed = read_bool(x, 0x00);
    let pack_mv = read_u32(x, 0x01);
    let switched_mv = read_u32(x, 0x05);
    let discharge_amps = read_i32(x, 0x09) as f64 / 1000.0;
    let precharge = ratio_percent(switched_mv as f64, pack_mv as f64);

    let event = if closed {
        "Contactor was Closed"
    } else {
        "Contactor was Opened"
    };

    DecodedMessage::event(event)
        .with_fields(fields([
            ("closed", closed.into()),
            ("pack_voltage_volts", (pack_mv as f64 / 1000.0).into()),
            ("switched_voltage_volts", (switched_mv as f64 / 1000.0).into()),
            ("precharge_percent", precharge.into()),
            ("discharge_current_amps", discharge_amps.into()),
        ]))
        .with_conditions(format!(
            "Pack V: {:6.1}V, Switched V: {:6.1}V, Prechg Pct: {:2.0}%, Dischg Cur: {:4.0}A",
            pack_mv as f64 / 1000.0,
            switched_mv as f64 / 1000.0,
            precharge,
            discharge_amps
        ))
}

pub fn discharge_cutback(x: &[u8]) -> DecodedMessage {
    let cut = (read_u8(x, 0x00) as f64 / 255.0 * 100.0).round() as i64;
    DecodedMessage::event("Discharge Cutback")
        .with_fields(fields([("cutback_percent", cut.into())]))
        .with_conditions(format!("{:2}%", cut))
}

pub fn contactor_drive(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event("Contactor drive turned on").with_conditions(format!(
        "Pack V: {:6.1}V, Switched V: {:6.1}V, Duty Cycle: {}%",
        read_u32(x, 0x01) as f64 / 1000.0,
        read_u32(x, 0x05) as f64 / 1000.0,
        read_u8(x, 0x09)
    ))
}
