//! This module contains the decoded data types the RK6006 reports.

use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

use crate::scaling;

/// "Protection status register".
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[repr(u16)]
pub enum ProtectionStatus {
    /// 0: No protection has tripped.
    None = 0x00,
    /// 1: OVP, over-voltage protection.
    OverVoltage = 0x01,
    /// 2: OCP, over-current protection.
    OverCurrent = 0x02,
}

impl ProtectionStatus {
    pub fn ovp_tripped(self) -> bool {
        self == Self::OverVoltage
    }

    pub fn ocp_tripped(self) -> bool {
        self == Self::OverCurrent
    }
}

impl From<u16> for ProtectionStatus {
    fn from(value: u16) -> Self {
        match value {
            0x01 => Self::OverVoltage,
            0x02 => Self::OverCurrent,
            // Default to no alarms active if outside of expected values.
            _ => Self::None,
        }
    }
}

/// Represents the two possible power supply regulation modes.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub enum OutputMode {
    /// Constant voltage regulation mode.
    ConstantVoltage,
    /// Constant current regulation mode.
    ConstantCurrent,
}

impl From<u16> for OutputMode {
    fn from(value: u16) -> Self {
        match value {
            0x01 => Self::ConstantCurrent,
            _ => Self::ConstantVoltage,
        }
    }
}

/// The measured output block: voltage, current and the recombined power.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputStatus {
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
}

/// The programmed voltage and current limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Setpoints {
    pub voltage: f64,
    pub current: f64,
}

/// Internal sensor plus the optional external probe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Temperatures {
    pub internal: f64,
    /// `None` when no probe is attached.
    pub external: Option<f64>,
}

/// The programmed protection trip points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectionSetpoints {
    pub ovp_voltage: f64,
    pub ocp_current: f64,
}

/// Accumulated output since the counters were last reset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyCounters {
    pub amp_hours: f64,
    pub watt_hours: f64,
}

/// Static identity block read once at connection time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: u16,
    pub serial: u32,
    pub firmware: f64,
}

impl DeviceInfo {
    /// The model register value the RK6006 reports.
    pub const RK6006_MODEL: u16 = 60066;

    pub fn is_rk6006(&self) -> bool {
        self.model == Self::RK6006_MODEL
    }
}

/// The battery charging block, meaningful when a battery is connected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryMode {
    pub active: bool,
    pub voltage: f64,
}

/// One stored preset: a full set of output and protection limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryPreset {
    pub voltage: f64,
    pub current: f64,
    pub ovp_voltage: f64,
    pub ocp_current: f64,
}

impl MemoryPreset {
    /// Decode the four consecutive registers of a preset slot.
    pub fn from_words(words: [u16; 4]) -> Self {
        Self {
            voltage: scaling::raw_to_voltage(words[0]),
            current: scaling::raw_to_current(words[1]),
            ovp_voltage: scaling::raw_to_voltage(words[2]),
            ocp_current: scaling::raw_to_current(words[3]),
        }
    }

    pub fn to_words(self) -> [u16; 4] {
        [
            scaling::voltage_to_raw(self.voltage),
            scaling::current_to_raw(self.current),
            scaling::voltage_to_raw(self.ovp_voltage),
            scaling::current_to_raw(self.ocp_current),
        ]
    }
}

/// One complete poll of the device, already scaled to engineering units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub output: OutputStatus,
    pub setpoints: Setpoints,
    pub temperatures: Temperatures,
    pub input_voltage: f64,
    pub protection_setpoints: ProtectionSetpoints,
    pub protection: ProtectionStatus,
    pub energy: EnergyCounters,
    pub backlight: u16,
    pub output_on: bool,
    pub output_mode: OutputMode,
    pub buzzer: bool,
    pub power_on_boot: bool,
    pub take_out: bool,
}
