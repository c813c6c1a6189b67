//! Connects to an RK6006 over BLE and prints a snapshot every few seconds.
//!
//! Usage: `cargo run --example monitor -- <address-or-name>`

use std::time::Duration;

use rk6006_ble::coordinator::Coordinator;
use rk6006_ble::{BleTransport, DeviceConfig, Rk6006};

const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let address = std::env::args()
        .nth(1)
        .expect("usage: monitor <address-or-name>");
    let config = DeviceConfig::new(address);

    let device = Rk6006::new(BleTransport::new(config.address.clone()));
    let mut coordinator = Coordinator::new(device);

    loop {
        match coordinator.refresh().await {
            Ok(snapshot) => {
                println!(
                    "{:6.2} V  {:6.3} A  {:7.2} W  out={} mode={:?} prot={:?}",
                    snapshot.output.voltage,
                    snapshot.output.current,
                    snapshot.output.power,
                    if snapshot.output_on { "on" } else { "off" },
                    snapshot.output_mode,
                    snapshot.protection,
                );
            }
            Err(err) => eprintln!("poll failed: {err}"),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
