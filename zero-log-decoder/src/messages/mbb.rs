//! Main board entry decoders

use super::bms::ratio_percent;
use super::{fields, DecodedMessage};
use crate::bytes::{self, read_bool, read_i16, read_i8, read_str, read_u16, read_u32, read_u8};
use crate::types::FieldValue;

/// Module status bits as the riding entry reports them
fn module_bits(raw: u8) -> &'static str {
    match raw {
        0x00 => "00",
        0x01 => "10",
        0x02 => "01",
        0x03 => "11",
        _ => "Unknown",
    }
}

fn millivolts_to_volts(mv: u32) -> f64 {
    mv as f64 / 1000.0
}

/// Key switch; "Key On " is padded to the width of "Key Off"
pub fn key_state(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event(if read_bool(x, 0x00) { "Key On " } else { "Key Off" })
}

pub fn battery_can_link(x: &[u8], up: bool) -> DecodedMessage {
    DecodedMessage::event(format!(
        "Module {:02} CAN Link {}",
        read_u8(x, 0x00),
        if up { "Up" } else { "Down" }
    ))
}

pub fn riding_status(x: &[u8]) -> DecodedMessage {
    let pack_temp_high = read_u8(x, 0x00);
    let pack_temp_low = read_u8(x, 0x01);
    let soc = read_u16(x, 0x02);
    let pack_voltage = millivolts_to_volts(read_u32(x, 0x04));
    let motor_temp = read_i16(x, 0x08);
    let controller_temp = read_i16(x, 0x0A);
    let rpm = read_u16(x, 0x0C);
    let battery_current = read_i16(x, 0x10);
    let mods_raw = read_u8(x, 0x12);
    let mods = module_bits(mods_raw);
    let motor_current = read_i16(x, 0x13);
    let ambient_temp = read_i16(x, 0x15);
    let odometer_m = read_u32(x, 0x17);
    let odometer_km = odometer_m as f64 / 1000.0;

    let conditions = format!(
        "PackTemp: h {}C, l {}C, PackSOC:{:3}%, Vpack:{:7.3}V, MotAmps:{:4}, BattAmps:{:4}, Mods: {}, MotTemp:{:4}C, CtrlTemp:{:4}C, AmbTemp:{:4}C, MotRPM:{:4}, Odo:{:5}km",
        pack_temp_high,
        pack_temp_low,
        soc,
        pack_voltage,
        motor_current,
        battery_current,
        mods,
        motor_temp,
        controller_temp,
        ambient_temp,
        rpm,
        odometer_m / 1000
    );

    DecodedMessage::event("Riding")
        .with_fields(fields([
            ("pack_temp_high_celsius", (pack_temp_high as i64).into()),
            ("pack_temp_low_celsius", (pack_temp_low as i64).into()),
            ("state_of_charge_percent", (soc as i64).into()),
            ("pack_voltage_volts", pack_voltage.into()),
            ("motor_temp_celsius", (motor_temp as i64).into()),
            ("controller_temp_celsius", (controller_temp as i64).into()),
            ("motor_rpm", (rpm as i64).into()),
            ("battery_current_amps", (battery_current as i64).into()),
            ("motor_current_amps", (motor_current as i64).into()),
            ("ambient_temp_celsius", (ambient_temp as i64).into()),
            ("odometer_km", odometer_km.into()),
            ("mods", mods.into()),
            ("mods_raw", (mods_raw as i64).into()),
        ]))
        .with_conditions(conditions)
}

pub fn charging_status(x: &[u8]) -> DecodedMessage {
    let pack_temp_high = read_u8(x, 0x00);
    let pack_temp_low = read_u8(x, 0x01);
    let soc = read_u16(x, 0x02);
    let pack_voltage = millivolts_to_volts(read_u32(x, 0x04));
    let battery_current = read_i8(x, 0x08);
    let mods = read_u8(x, 0x0C);
    let ambient_temp = read_i8(x, 0x0D);

    DecodedMessage::event("Charging")
        .with_fields(fields([
            ("pack_temp_high_celsius", (pack_temp_high as i64).into()),
            ("pack_temp_low_celsius", (pack_temp_low as i64).into()),
            ("ambient_temp_celsius", (ambient_temp as i64).into()),
            ("state_of_charge_percent", (soc as i64).into()),
            ("pack_voltage_volts", pack_voltage.into()),
            ("battery_current_amps", (battery_current as i64).into()),
            ("mods", (mods as i64).into()),
            ("mbb_charge_enabled", true.into()),
            ("bms_charge_enabled", false.into()),
        ]))
        .with_conditions(format!(
            "PackTemp: h {}C, l {}C, AmbTemp: {}C, PackSOC:{:3}%, Vpack:{:7.3}V, BattAmps: {:3}, Mods: {:02b}, MbbChgEn: Yes, BmsChgEn: No",
            pack_temp_high, pack_temp_low, ambient_temp, soc, pack_voltage, battery_current, mods
        ))
}

pub fn disarmed_status(x: &[u8]) -> DecodedMessage {
    let pack_temp_high = read_u8(x, 0x00);
    let pack_temp_low = read_u8(x, 0x01);
    let soc = read_u16(x, 0x02);
    let pack_voltage = millivolts_to_volts(read_u32(x, 0x04));
    let motor_temp = read_i16(x, 0x08);
    let controller_temp = read_i16(x, 0x0A);
    let rpm = read_u16(x, 0x0C);
    let battery_current = read_u8(x, 0x10);
    let mods = read_u8(x, 0x12);
    let motor_current = read_i8(x, 0x13);
    let ambient_temp = read_i16(x, 0x15);
    let odometer_m = read_u32(x, 0x17);

    DecodedMessage::event("Disarmed")
        .with_fields(fields([
            ("pack_temp_high_celsius", (pack_temp_high as i64).into()),
            ("pack_temp_low_celsius", (pack_temp_low as i64).into()),
            ("state_of_charge_percent", (soc as i64).into()),
            ("pack_voltage_volts", pack_voltage.into()),
            ("motor_temp_celsius", (motor_temp as i64).into()),
            ("controller_temp_celsius", (controller_temp as i64).into()),
            ("motor_rpm", (rpm as i64).into()),
            ("battery_current_amps", (battery_current as i64).into()),
            ("motor_current_amps", (motor_current as i64).into()),
            ("ambient_temp_celsius", (ambient_temp as i64).into()),
            ("odometer_km", (odometer_m as f64 / 1000.0).into()),
            ("mods_raw", (mods as i64).into()),
        ]))
        .with_conditions(format!(
            "PackTemp: h {}C, l {}C, PackSOC:{:3}%, Vpack:{:03.3}V, MotAmps:{:4}, BattAmps:{:4}, Mods: {:02b}, MotTemp:{:4}C, CtrlTemp:{:4}C, AmbTemp:{:4}C, MotRPM:{:4}, Odo:{:5}km",
            pack_temp_high,
            pack_temp_low,
            soc,
            pack_voltage,
            motor_current,
            battery_current,
            mods,
            motor_temp,
            controller_temp,
            ambient_temp,
            rpm,
            odometer_m / 1000
        ))
}

pub fn sevcon_status(x: &[u8]) -> DecodedMessage {
    let code = read_u16(x, 0x00);
    let sevcon_code = read_u16(x, 0x02);
    let register = read_u8(x, 0x04);
    let data = x
        .get(5..)
        .unwrap_or(&[])
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ");
    let cause = match sevcon_code {
        0x4681 => "Preop",
        0x4884 => "Sequence Fault",
        0x4981 => "Throttle Fault",
        _ => "Unknown",
    };

    DecodedMessage::event("SEVCON CAN EMCY Frame").with_conditions(format!(
        "Error Code: 0x{:04X}, Error Reg: 0x{:02X}, Sevcon Error Code: 0x{:04X}, Data: {}, {}",
        code, register, sevcon_code, data, cause
    ))
}

pub fn charger_status(x: &[u8]) -> DecodedMessage {
    let charger_id = read_u8(x, 0x00);
    let name = match charger_id {
        0x00 => "Calex 720W",
        0x01 => "Calex 1200W",
        0x02 => "External Chg 0",
        0x03 => "External Chg 1",
        _ => "Unknown",
    };
    let state = match read_u8(x, 0x01) {
        0x00 => "Disconnected",
        0x01 => "Connected",
        _ => "Unknown",
    };
    DecodedMessage::event(format!("{} Charger {} {}", name, charger_id, state))
}

pub fn battery_module_status(x: &[u8]) -> DecodedMessage {
    let event_code = read_u8(x, 0x00);
    let module = read_u8(x, 0x01);
    let module_volts = millivolts_to_volts(read_u32(x, 0x02));
    let system_max = millivolts_to_volts(read_u32(x, 0x06));
    let system_min = millivolts_to_volts(read_u32(x, 0x0A));
    let capacitor_volts = millivolts_to_volts(read_u32(x, 0x0E));
    let battery_current = read_i16(x, 0x12);
    let serial: String = read_str(x, 0x14, x.len().saturating_sub(0x14))
        .chars()
        .filter(|c| bytes::is_printable_char(*c))
        .collect();

    let (event_name, conditions) = match event_code {
        0x00 => (
            "Opening Contactor".to_string(),
            Some(format!(
                "vmod: {:7.3}V, batt curr: {:3}A",
                module_volts, battery_current
            )),
        ),
        0x01 => (
            "Closing Contactor".to_string(),
            Some(format!(
                "vmod: {:7.3}V, maxsys: {:7.3}V, minsys: {:7.3}V, diff: {:.3}V, vcap: {:6.3}V, prechg: {:2.0}%",
                module_volts,
                system_max,
                system_min,
                system_max - system_min,
                capacitor_volts,
                ratio_percent(capacitor_volts, module_volts)
            )),
        ),
        0x02 => (
            "Registered".to_string(),
            Some(format!("serial: {},  vmod: {:3.3}V", serial, module_volts)),
        ),
        other => (format!("Unknown (0x{:02x})", other), None),
    };

    let message = DecodedMessage::event(format!("Module {:02} {}", module, event_name)).with_fields(
        fields([
            ("module", (module as i64).into()),
            ("module_voltage_volts", module_volts.into()),
            ("system_max_volts", system_max.into()),
            ("system_min_volts", system_min.into()),
            ("capacitor_voltage_volts", capacitor_volts.into()),
            ("battery_current_amps", (battery_current as i64).into()),
            ("serial", serial.into()),
        ]),
    );

    match conditions {
        Some(text) => message.with_conditions(text),
        None => message,
    }
}

pub fn power_state(x: &[u8]) -> DecodedMessage {
    let on = read_bool(x, 0x00);
    let source = match read_u8(x, 0x01) {
        0x01 => "Key Switch",
        0x02 => "Ext Charger 0",
        0x03 => "Ext Charger 1",
        0x04 => "Onboard Charger",
        _ => "Unknown",
    };
    DecodedMessage::event(if on { "Power On" } else { "Power Off" }).with_conditions(source)
}

pub fn sevcon_power_state(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event(if read_bool(x, 0x00) {
        "Sevcon Turned On"
    } else {
        "Sevcon Turned Off"
    })
}

pub fn discharge_current_limited(x: &[u8]) -> DecodedMessage {
    let limit = read_u16(x, 0x00);
    let min_cell = read_u16(x, 0x02);
    let temp = read_u8(x, 0x04);
    let max_amps = read_u16(x, 0x05);
    let percent = ratio_percent(limit as f64, max_amps as f64);

    DecodedMessage::event("Batt Dischg Cur Limited")
        .with_fields(fields([
            ("limit_amps", (limit as i64).into()),
            ("limit_percent", percent.into()),
            ("min_cell_mv", (min_cell as i64).into()),
            ("max_pack_temp_celsius", (temp as i64).into()),
            ("max_amps", (max_amps as i64).into()),
        ]))
        .with_conditions(format!(
            "{} A ({:.2}%), MinCell: {}mV, MaxPackTemp: {}C",
            limit, percent, min_cell, temp
        ))
}

pub fn low_chassis_isolation(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event("Low Chassis Isolation").with_conditions(format!(
        "{} KOhms to cell {}",
        read_u32(x, 0x00),
        read_u8(x, 0x04)
    ))
}

pub fn module_contactor_closed(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event(format!("Battery module {:02} contactor closed", read_u8(x, 0x00)))
}

/// States in which the telemetry entry describes riding
const RIDING_STATES: [&str; 4] = ["RUN", "IB", "WSU", "UN"];

pub fn vehicle_state_telemetry(x: &[u8]) -> DecodedMessage {
    let state: String = x
        .get(36..40)
        .unwrap_or(&[])
        .iter()
        .take_while(|b| **b != 0)
        .filter(|b| b.is_ascii())
        .map(|b| *b as char)
        .collect();

    let odometer_m = read_u32(x, 0);
    let soc_raw = read_u32(x, 4);
    let ambient_raw = read_u32(x, 8);
    let temps = [read_u8(x, 48), read_u8(x, 49), read_u8(x, 50), read_u8(x, 51)];

    let odometer_km = odometer_m / 1000;
    // Raw charge readings span roughly 200..800
    let soc_percent = ((soc_raw as f64 - 200.0) / 6.0).trunc().clamp(0.0, 100.0) as i64;
    let ambient = if ambient_raw > 1000 {
        ambient_raw / 1000
    } else {
        ambient_raw
    };

    let fields = fields([
        ("vehicle_state", state.as_str().into()),
        ("odometer_m", (odometer_m as i64).into()),
        ("odometer_km", (odometer_km as i64).into()),
        ("soc_raw", (soc_raw as i64).into()),
        ("soc_percent", soc_percent.into()),
        ("ambient_temp_raw", (ambient_raw as i64).into()),
        ("temp_1", (temps[0] as i64).into()),
        ("temp_2", (temps[1] as i64).into()),
        ("temp_3", (temps[2] as i64).into()),
        ("temp_4", (temps[3] as i64).into()),
    ]);

    if RIDING_STATES.contains(&state.as_str()) {
        DecodedMessage::event("Riding")
            .with_fields(fields)
            .with_conditions(format!(
                "State: {}, PackSOC: {:3}%, Odo: {:5}km, AmbTemp: {:2}C, Temp1: {:2}C, Temp2: {:2}C, Temp3: {:2}C, Temp4: {:2}C",
                state, soc_percent, odometer_km, ambient, temps[0], temps[1], temps[2], temps[3]
            ))
    } else {
        DecodedMessage::event(format!("Vehicle State ({})", state)).with_fields(fields)
    }
}

pub fn sensor_data(x: &[u8]) -> DecodedMessage {
    DecodedMessage::event("Sensor Data").with_fields(fields([
        ("odometer_m", (read_u32(x, 0) as i64).into()),
        ("sensor_1", (read_u32(x, 4) as i64).into()),
        ("sensor_2", (read_u32(x, 8) as i64).into()),
        ("sensor_3", (read_u32(x, 12) as i64).into()),
        ("sensor_4", (read_u32(x, 16) as i64).into()),
        ("status", FieldValue::Integer(read_u16(x, 20) as i64)),
    ]))
}
