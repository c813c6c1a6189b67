//! This module defines the holding registers of the RK6006.

use strum_macros::EnumIter;

/// Distance between consecutive memory preset slots.
pub const MEMORY_SLOT_STRIDE: u16 = 4;

/// Number of memory preset slots (M0 through M9).
pub const MEMORY_SLOT_COUNT: u8 = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, EnumIter)]
#[repr(u16)]
pub enum Register {
    /// __R__ - Product model number.
    ///
    /// The RK6006 reports `60066`.
    Model = 0x0000,
    /// __R__ - Serial number, high 16 bits.
    SerialHigh = 0x0001,
    /// __R__ - Serial number, low 16 bits.
    SerialLow = 0x0002,
    /// __R__ - Firmware version.
    ///
    /// Value is centi-versions. E.g. firmware 1.34 => `134`.
    Firmware = 0x0003,
    /// __R__ - External probe temperature.
    ///
    /// Values of 65000 and above mean no probe is attached.
    TempExternal = 0x0004,
    /// __R__ - Internal temperature.
    TempInternal = 0x0005,
    /// __R/W__ - Voltage setting.
    ///
    /// Value is u16 in centi-volts. E.g. 5.0V => `500`.
    VSet = 0x0008,
    /// __R/W__ - Current setting.
    ///
    /// Value is u16 in milli-amps. E.g. 1.5A => `1500`.
    ISet = 0x0009,
    /// __R__ - Output voltage display value.
    VOut = 0x000A,
    /// __R__ - Output current display value.
    IOut = 0x000B,
    /// __R__ - Output power, high 16 bits.
    PowerHigh = 0x000C,
    /// __R__ - Output power, low 16 bits.
    PowerLow = 0x000D,
    /// __R__ - Input (supply) voltage display value.
    InputVoltage = 0x000E,
    /// __R__ - Protection status.
    ///
    /// See [`ProtectionStatus`](crate::types::ProtectionStatus).
    Protection = 0x0010,
    /// __R__ - Constant voltage constant current state.
    /// * `0` - CV.
    /// * `1` - CC.
    ///
    /// See [`OutputMode`](crate::types::OutputMode).
    OutputMode = 0x0011,
    /// __R/W__ - Switched output.
    /// * `0` - Off.
    /// * `1` - On.
    OutputState = 0x0012,
    /// __R__ - Accumulated charge, high 16 bits.
    ///
    /// Combined value is milli-amp-hours.
    AhHigh = 0x0026,
    /// __R__ - Accumulated charge, low 16 bits.
    AhLow = 0x0027,
    /// __R__ - Accumulated energy, high 16 bits.
    ///
    /// Combined value is milli-watt-hours.
    WhHigh = 0x0028,
    /// __R__ - Accumulated energy, low 16 bits.
    WhLow = 0x0029,
    /// __R__ - Battery charging mode active.
    BatteryMode = 0x0032,
    /// __R__ - Battery terminal voltage.
    BatteryVoltage = 0x0033,
    /// __R/W__ - Output-off on preset recall.
    TakeOut = 0x0043,
    /// __R/W__ - Restore output state at power-on.
    PowerOnBoot = 0x0044,
    /// __R/W__ - The buzzer switch.
    Buzzer = 0x0045,
    /// __R/W__ - Backlight brightness level.
    ///
    /// Range = 0-5.
    ///
    /// 0 is darkest, and 5 is the brightest.
    Backlight = 0x0048,
    /// __R/W__ - Preset slot M0 voltage; slots are 4 registers apart.
    ///
    /// Each slot holds voltage, current, OVP and OCP in order, so M0's OVP
    /// and OCP double as the live protection setpoints.
    MemoryBase = 0x0050,
    /// __R/W__ - Over-voltage protection setpoint.
    Ovp = 0x0052,
    /// __R/W__ - Over-current protection setpoint.
    Ocp = 0x0053,
}

impl From<Register> for u16 {
    fn from(value: Register) -> Self {
        value as u16
    }
}

/// Base register of memory preset slot `slot`, or `None` when the slot is
/// out of range.
pub fn memory_slot_base(slot: u8) -> Option<u16> {
    if slot < MEMORY_SLOT_COUNT {
        Some(Register::MemoryBase as u16 + slot as u16 * MEMORY_SLOT_STRIDE)
    } else {
        None
    }
}
