//! Persisted per-device configuration.

use serde::{Deserialize, Serialize};

/// Configuration for one RK6006.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// BLE address or advertised name of the supply.
    pub address: String,
    /// Whether polling should run at all. Defaults to `true` so entries
    /// saved before the flag existed keep polling.
    #[serde(default = "default_connection_enabled")]
    pub connection_enabled: bool,
}

fn default_connection_enabled() -> bool {
    true
}

impl DeviceConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connection_enabled: true,
        }
    }
}
