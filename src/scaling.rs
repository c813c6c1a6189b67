//! Conversions between raw register words and engineering units.
//!
//! The RK6006 reports voltages in centi-volts and currents in milli-amps;
//! power and the energy counters span two registers each.

/// Volts per voltage register count.
pub const VOLTAGE_STEP: f64 = 0.01;
/// Amps per current register count.
pub const CURRENT_STEP: f64 = 0.001;
/// Watts per combined power count.
pub const POWER_STEP: f64 = 0.01;
/// Amp-hours or watt-hours per combined energy count.
pub const ENERGY_STEP: f64 = 0.001;

/// External temperature readings at or above this mean no probe is attached.
pub const EXTERNAL_PROBE_ABSENT: u16 = 65_000;

pub fn raw_to_voltage(raw: u16) -> f64 {
    raw as f64 * VOLTAGE_STEP
}

/// Quantizes to the nearest representable step, so 12.049 and 12.051 both
/// land on 12.05.
pub fn voltage_to_raw(volts: f64) -> u16 {
    (volts / VOLTAGE_STEP).round() as u16
}

pub fn raw_to_current(raw: u16) -> f64 {
    raw as f64 * CURRENT_STEP
}

pub fn current_to_raw(amps: f64) -> u16 {
    (amps / CURRENT_STEP).round() as u16
}

/// Recombine a register pair into the 32-bit value it carries.
pub fn combine_words(high: u16, low: u16) -> u32 {
    ((high as u32) << 16) | low as u32
}

pub fn raw32_to_power(raw: u32) -> f64 {
    raw as f64 * POWER_STEP
}

pub fn raw32_to_energy(raw: u32) -> f64 {
    raw as f64 * ENERGY_STEP
}

/// Decode the external probe register, `None` when no probe is attached.
pub fn external_temperature(raw: u16) -> Option<f64> {
    if raw >= EXTERNAL_PROBE_ABSENT {
        None
    } else {
        Some(raw as f64)
    }
}
