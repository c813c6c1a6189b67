//! BLE transport for the RK6006's UART-over-GATT service.
//!
//! The supply exposes a HM-10 style UART bridge: one characteristic takes
//! request frames as unacknowledged writes and delivers response bytes back
//! as notifications, fragmented at the radio's whim.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use futures::stream::StreamExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TransportError;
use crate::transport::Transport;

/// The UART bridge service.
pub const UART_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);

/// The single read/write/notify characteristic inside it.
pub const UART_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

const SCAN_TIME: Duration = Duration::from_secs(3);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const FRAGMENT_CHANNEL_DEPTH: usize = 64;

/// A [`Transport`] over the system Bluetooth adapter.
pub struct BleTransport {
    address: String,
    peripheral: Option<Peripheral>,
    characteristic: Option<Characteristic>,
    notification_task: Option<tokio::task::JoinHandle<()>>,
}

impl BleTransport {
    /// Create a transport targeting the peripheral with the given address
    /// or advertised name. Nothing happens until `connect`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            peripheral: None,
            characteristic: None,
            notification_task: None,
        }
    }

    /// Abort the forwarder task and release the peripheral, if any.
    async fn teardown(&mut self) -> Result<(), TransportError> {
        if let Some(task) = self.notification_task.take() {
            task.abort();
        }
        self.characteristic = None;
        if let Some(peripheral) = self.peripheral.take() {
            peripheral
                .disconnect()
                .await
                .map_err(|e| TransportError::DisconnectFailed(e.to_string()))?;
        }
        Ok(())
    }

    async fn find_peripheral(&self, adapter: &Adapter) -> Result<Peripheral, TransportError> {
        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to get peripherals: {e}")))?;

        for peripheral in peripherals {
            if let Ok(Some(props)) = peripheral.properties().await {
                let name = props.local_name.unwrap_or_default();
                let address = peripheral.id().to_string();
                if name == self.address || address == self.address {
                    return Ok(peripheral);
                }
            }
        }

        Err(TransportError::ConnectFailed(format!(
            "device '{}' not found",
            self.address
        )))
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn connect(&mut self) -> Result<mpsc::Receiver<Bytes>, TransportError> {
        // A reconnect after a failed exchange must not leak the previous
        // attempt's forwarder task or its half-dead peripheral.
        if let Err(err) = self.teardown().await {
            tracing::debug!(error = %err, "ignoring stale link teardown failure");
        }

        let manager = Manager::new()
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to create manager: {e}")))?;

        let adapters = manager
            .adapters()
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to get adapters: {e}")))?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::ConnectFailed("no Bluetooth adapter found".into()))?;

        adapter
            .start_scan(ScanFilter {
                services: vec![UART_SERVICE_UUID],
            })
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to start scan: {e}")))?;

        tokio::time::sleep(SCAN_TIME).await;

        let peripheral = self.find_peripheral(&adapter).await?;

        adapter
            .stop_scan()
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to stop scan: {e}")))?;

        tokio::time::timeout(CONNECT_TIMEOUT, peripheral.connect())
            .await
            .map_err(|_| TransportError::ConnectFailed("connection timeout".into()))?
            .map_err(|e| TransportError::ConnectFailed(format!("failed to connect: {e}")))?;

        peripheral
            .discover_services()
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to discover services: {e}")))?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == UART_CHARACTERISTIC_UUID)
            .ok_or_else(|| {
                TransportError::ConnectFailed("UART characteristic not found".into())
            })?;

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to subscribe: {e}")))?;

        let mut notifications = peripheral
            .notifications()
            .await
            .map_err(|e| TransportError::ConnectFailed(format!("failed to take notifications: {e}")))?;

        tracing::info!(device = %self.address, "connected");

        let (tx, rx) = mpsc::channel(FRAGMENT_CHANNEL_DEPTH);
        let task = tokio::spawn(async move {
            // The stream ends when the peripheral drops; the sender going
            // with it closes the channel and unblocks any waiter.
            while let Some(data) = notifications.next().await {
                if tx.send(Bytes::from(data.value)).await.is_err() {
                    break;
                }
            }
        });

        self.peripheral = Some(peripheral);
        self.characteristic = Some(characteristic);
        self.notification_task = Some(task);
        Ok(rx)
    }

    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        let peripheral = self.peripheral.as_ref().ok_or(TransportError::Disconnected)?;
        let characteristic = self
            .characteristic
            .as_ref()
            .ok_or(TransportError::Disconnected)?;

        peripheral
            .write(characteristic, frame, WriteType::WithoutResponse)
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.teardown().await
    }
}
