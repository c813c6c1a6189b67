//! This crate provides an interface for monitoring and controlling the
//! Ruideng RK6006 programmable bench power supply over Bluetooth Low Energy.
//!
//! The RK6006 speaks Modbus RTU tunneled through a HM-10 style UART bridge:
//! read-holding-registers and write-single-register frames go out as GATT
//! writes, and responses come back as notifications fragmented at the
//! radio's whim.
//!
//! The crate is layered bottom-up:
//! * [`frame`] builds and validates the Modbus RTU frames.
//! * [`reassembly`] stitches notification fragments back into frames.
//! * [`transport`] serializes commands over a [`transport::Transport`],
//!   one in flight at a time, with [`ble`] as the radio-backed transport.
//! * [`device`] exposes the register map as typed operations in
//!   engineering units.
//! * [`coordinator`] polls the device into [`types::Snapshot`]s and rides
//!   out the brief link drops BLE is prone to.

pub mod ble;
pub mod config;
pub mod coordinator;
pub mod device;
pub mod error;
pub mod frame;
pub mod reassembly;
pub mod registers;
pub mod scaling;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_transport;

pub use ble::BleTransport;
pub use config::DeviceConfig;
pub use coordinator::{ConnectionState, Coordinator};
pub use device::Rk6006;
pub use error::{Error, FrameError, Result, TransportError};
pub use transport::{Session, Transport};
pub use types::Snapshot;
