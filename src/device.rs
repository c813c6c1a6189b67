//! The RK6006 driver: semantic operations on top of the command session.
//!
//! Method nomenclature: "set" writes a configuration value, "get" reads one
//! back. Measured values come through the block reads like
//! [`Rk6006::get_status`]. All values cross this boundary in engineering
//! units; the raw register scaling never leaks to callers.

use crate::error::Result;
use crate::frame;
use crate::registers::{Register, memory_slot_base};
use crate::scaling;
use crate::transport::{Session, Transport};
use crate::types::{
    BatteryMode, DeviceInfo, EnergyCounters, MemoryPreset, OutputMode, OutputStatus,
    ProtectionSetpoints, ProtectionStatus, Setpoints, Temperatures,
};

/// Default Modbus unit ID of the RK6006.
pub const DEFAULT_UNIT_ID: u8 = 1;

/// Highest accepted backlight brightness level.
pub const BACKLIGHT_MAX: u16 = 5;

/// An RK6006 bench power supply behind a [`Transport`].
pub struct Rk6006<T: Transport> {
    session: Session<T>,
    unit_id: u8,
}

impl<T: Transport> Rk6006<T> {
    pub fn new(transport: T) -> Self {
        Self::with_unit_id(transport, DEFAULT_UNIT_ID)
    }

    pub fn with_unit_id(transport: T, unit_id: u8) -> Self {
        Self {
            session: Session::new(transport),
            unit_id,
        }
    }

    pub async fn connect(&self) -> Result<()> {
        self.session.connect().await?;
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.session.disconnect().await;
    }

    /// Read `count` consecutive registers starting at `register`.
    async fn read_registers(&self, register: impl Into<u16>, count: usize) -> Result<Vec<u16>> {
        let request = frame::build_read(self.unit_id, register.into(), count as u16);
        let response = self.session.send_and_await(&request).await?;
        let words = frame::parse_read_response(&response, count)?;
        Ok(words)
    }

    async fn read_single(&self, register: impl Into<u16>) -> Result<u16> {
        let words = self.read_registers(register, 1).await?;
        Ok(words[0])
    }

    async fn write_register(&self, register: impl Into<u16>, value: u16) -> Result<()> {
        let request = frame::build_write(self.unit_id, register.into(), value);
        let response = self.session.send_and_await(&request).await?;
        frame::parse_write_response(&response)?;
        Ok(())
    }

    /// Read the measured output block in one command: voltage, current and
    /// the two power words.
    pub async fn get_status(&self) -> Result<OutputStatus> {
        let words = self.read_registers(Register::VOut, 4).await?;
        Ok(OutputStatus {
            voltage: scaling::raw_to_voltage(words[0]),
            current: scaling::raw_to_current(words[1]),
            power: scaling::raw32_to_power(scaling::combine_words(words[2], words[3])),
        })
    }

    /// Read the programmed voltage and current limits in one command.
    pub async fn get_settings(&self) -> Result<Setpoints> {
        let words = self.read_registers(Register::VSet, 2).await?;
        Ok(Setpoints {
            voltage: scaling::raw_to_voltage(words[0]),
            current: scaling::raw_to_current(words[1]),
        })
    }

    pub async fn get_voltage(&self) -> Result<f64> {
        let raw = self.read_single(Register::VSet).await?;
        Ok(scaling::raw_to_voltage(raw))
    }

    pub async fn set_voltage(&self, volts: f64) -> Result<()> {
        self.write_register(Register::VSet, scaling::voltage_to_raw(volts))
            .await
    }

    pub async fn get_current(&self) -> Result<f64> {
        let raw = self.read_single(Register::ISet).await?;
        Ok(scaling::raw_to_current(raw))
    }

    pub async fn set_current(&self, amps: f64) -> Result<()> {
        self.write_register(Register::ISet, scaling::current_to_raw(amps))
            .await
    }

    /// Read both temperature sensors in one command. The external reading is
    /// `None` when no probe is attached.
    pub async fn get_temperatures(&self) -> Result<Temperatures> {
        // The register after the internal reading mirrors the external
        // probe, so one two-word read covers both sensors.
        let words = self.read_registers(Register::TempInternal, 2).await?;
        Ok(Temperatures {
            internal: words[0] as f64,
            external: scaling::external_temperature(words[1]),
        })
    }

    /// Read the measured supply input voltage.
    pub async fn get_input_voltage(&self) -> Result<f64> {
        let raw = self.read_single(Register::InputVoltage).await?;
        Ok(scaling::raw_to_voltage(raw))
    }

    pub async fn get_ovp(&self) -> Result<f64> {
        let raw = self.read_single(Register::Ovp).await?;
        Ok(scaling::raw_to_voltage(raw))
    }

    pub async fn set_ovp(&self, volts: f64) -> Result<()> {
        self.write_register(Register::Ovp, scaling::voltage_to_raw(volts))
            .await
    }

    pub async fn get_ocp(&self) -> Result<f64> {
        let raw = self.read_single(Register::Ocp).await?;
        Ok(scaling::raw_to_current(raw))
    }

    pub async fn set_ocp(&self, amps: f64) -> Result<()> {
        self.write_register(Register::Ocp, scaling::current_to_raw(amps))
            .await
    }

    /// Read both protection trip points in one command.
    pub async fn get_protection_setpoints(&self) -> Result<ProtectionSetpoints> {
        let words = self.read_registers(Register::Ovp, 2).await?;
        Ok(ProtectionSetpoints {
            ovp_voltage: scaling::raw_to_voltage(words[0]),
            ocp_current: scaling::raw_to_current(words[1]),
        })
    }

    pub async fn get_protection_status(&self) -> Result<ProtectionStatus> {
        let raw = self.read_single(Register::Protection).await?;
        Ok(ProtectionStatus::from(raw))
    }

    /// Read both energy counters in one command: charge and energy, each a
    /// register pair.
    pub async fn get_energy_counters(&self) -> Result<EnergyCounters> {
        let words = self.read_registers(Register::AhHigh, 4).await?;
        Ok(EnergyCounters {
            amp_hours: scaling::raw32_to_energy(scaling::combine_words(words[0], words[1])),
            watt_hours: scaling::raw32_to_energy(scaling::combine_words(words[2], words[3])),
        })
    }

    pub async fn get_backlight(&self) -> Result<u16> {
        self.read_single(Register::Backlight).await
    }

    /// Set the backlight brightness level, 0 (darkest) through 5.
    pub async fn set_backlight(&self, level: u16) -> Result<()> {
        if level > BACKLIGHT_MAX {
            return Err(crate::error::Error::InvalidArgument(
                "backlight level must be 0-5",
            ));
        }
        self.write_register(Register::Backlight, level).await
    }

    pub async fn get_output(&self) -> Result<bool> {
        let raw = self.read_single(Register::OutputState).await?;
        Ok(raw != 0)
    }

    pub async fn set_output(&self, on: bool) -> Result<()> {
        self.write_register(Register::OutputState, on as u16).await
    }

    /// Read the active regulation mode. (CV or CC.)
    pub async fn get_output_mode(&self) -> Result<OutputMode> {
        let raw = self.read_single(Register::OutputMode).await?;
        Ok(OutputMode::from(raw))
    }

    pub async fn get_buzzer(&self) -> Result<bool> {
        let raw = self.read_single(Register::Buzzer).await?;
        Ok(raw != 0)
    }

    pub async fn set_buzzer(&self, on: bool) -> Result<()> {
        self.write_register(Register::Buzzer, on as u16).await
    }

    pub async fn get_power_on_boot(&self) -> Result<bool> {
        let raw = self.read_single(Register::PowerOnBoot).await?;
        Ok(raw != 0)
    }

    pub async fn set_power_on_boot(&self, on: bool) -> Result<()> {
        self.write_register(Register::PowerOnBoot, on as u16).await
    }

    pub async fn get_take_out(&self) -> Result<bool> {
        let raw = self.read_single(Register::TakeOut).await?;
        Ok(raw != 0)
    }

    pub async fn set_take_out(&self, on: bool) -> Result<()> {
        self.write_register(Register::TakeOut, on as u16).await
    }

    /// Read the identity block in one command: model, the serial number
    /// pair and the firmware version.
    pub async fn get_device_info(&self) -> Result<DeviceInfo> {
        let words = self.read_registers(Register::Model, 4).await?;
        Ok(DeviceInfo {
            model: words[0],
            serial: scaling::combine_words(words[1], words[2]),
            firmware: words[3] as f64 / 100.0,
        })
    }

    pub async fn get_battery_mode(&self) -> Result<BatteryMode> {
        let words = self.read_registers(Register::BatteryMode, 2).await?;
        Ok(BatteryMode {
            active: words[0] != 0,
            voltage: scaling::raw_to_voltage(words[1]),
        })
    }

    /// Enable or disable battery charging mode, optionally programming the
    /// charge voltage first.
    pub async fn set_battery_mode(&self, enabled: bool, voltage: Option<f64>) -> Result<()> {
        if enabled {
            if let Some(volts) = voltage {
                self.write_register(Register::BatteryVoltage, scaling::voltage_to_raw(volts))
                    .await?;
            }
        }
        self.write_register(Register::BatteryMode, enabled as u16)
            .await
    }

    /// Store a preset into memory slot `slot` (0-9).
    ///
    /// Writing slot 0 also changes the live OVP/OCP setpoints, which share
    /// its registers.
    pub async fn save_memory(&self, slot: u8, preset: MemoryPreset) -> Result<()> {
        let base = memory_slot_base(slot)
            .ok_or(crate::error::Error::InvalidArgument("memory slot must be 0-9"))?;
        for (offset, word) in preset.to_words().into_iter().enumerate() {
            self.write_register(base + offset as u16, word).await?;
        }
        Ok(())
    }

    /// Read back the preset stored in memory slot `slot` (0-9), optionally
    /// applying it through the live setpoint registers.
    pub async fn recall_memory(&self, slot: u8, apply: bool) -> Result<MemoryPreset> {
        let base = memory_slot_base(slot)
            .ok_or(crate::error::Error::InvalidArgument("memory slot must be 0-9"))?;
        let words = self.read_registers(base, 4).await?;
        let preset = MemoryPreset::from_words([words[0], words[1], words[2], words[3]]);
        if apply {
            self.set_voltage(preset.voltage).await?;
            self.set_current(preset.current).await?;
            self.set_ovp(preset.ovp_voltage).await?;
            self.set_ocp(preset.ocp_current).await?;
        }
        Ok(preset)
    }
}
