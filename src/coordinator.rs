//! Polling coordinator: turns the command-level driver into a periodically
//! refreshed [`Snapshot`] with tolerance for brief link drops.
//!
//! BLE links to the RK6006 drop routinely, so a single failed poll does not
//! invalidate the readings. The coordinator keeps serving the last good
//! snapshot until the failures become consecutive enough to mean the device
//! is really gone.

use std::sync::Arc;

use tokio::sync::{Notify, watch};

use crate::device::Rk6006;
use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::Snapshot;

/// Failed polls tolerated before a refresh reports hard failure.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// Link state as the coordinator sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Manages polling one RK6006 and caching its last known state.
pub struct Coordinator<T: Transport> {
    device: Rk6006<T>,
    state: ConnectionState,
    connection_enabled: bool,
    consecutive_errors: u32,
    snapshot: Option<Snapshot>,
    updates: watch::Sender<Option<Snapshot>>,
    poll_nudge: Arc<Notify>,
}

impl<T: Transport> Coordinator<T> {
    pub fn new(device: Rk6006<T>) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            device,
            state: ConnectionState::Disconnected,
            connection_enabled: true,
            consecutive_errors: 0,
            snapshot: None,
            updates,
            poll_nudge: Arc::new(Notify::new()),
        }
    }

    /// Poll the device for a fresh snapshot.
    ///
    /// A failed poll below the tolerance threshold returns the cached
    /// snapshot so a brief drop does not blank out the readings; the
    /// threshold-crossing failure, or a failure with nothing cached yet,
    /// surfaces the error.
    pub async fn refresh(&mut self) -> Result<Snapshot> {
        if !self.connection_enabled {
            return Err(Error::ConnectionDisabled);
        }

        match self.poll_once().await {
            Ok(snapshot) => {
                self.consecutive_errors = 0;
                self.state = ConnectionState::Connected;
                self.snapshot = Some(snapshot);
                self.updates.send_replace(Some(snapshot));
                Ok(snapshot)
            }
            Err(err) => {
                self.consecutive_errors += 1;
                self.state = ConnectionState::Disconnected;
                tracing::warn!(
                    error = %err,
                    attempt = self.consecutive_errors,
                    tolerance = MAX_CONSECUTIVE_ERRORS,
                    "poll failed"
                );
                if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                    return Err(err);
                }
                // Serve the cached readings through a brief drop.
                self.snapshot.ok_or(err)
            }
        }
    }

    async fn poll_once(&mut self) -> Result<Snapshot> {
        if self.state != ConnectionState::Connected {
            self.state = ConnectionState::Connecting;
            tracing::info!("connecting");
            self.device.connect().await?;
        }

        tracing::debug!("fetching device state");
        let output = self.device.get_status().await?;
        let setpoints = self.device.get_settings().await?;
        let temperatures = self.device.get_temperatures().await?;
        let input_voltage = self.device.get_input_voltage().await?;
        let protection_setpoints = self.device.get_protection_setpoints().await?;
        let protection = self.device.get_protection_status().await?;
        let energy = self.device.get_energy_counters().await?;
        let backlight = self.device.get_backlight().await?;
        let output_on = self.device.get_output().await?;
        let output_mode = self.device.get_output_mode().await?;
        let buzzer = self.device.get_buzzer().await?;
        let power_on_boot = self.device.get_power_on_boot().await?;
        let take_out = self.device.get_take_out().await?;

        Ok(Snapshot {
            output,
            setpoints,
            temperatures,
            input_voltage,
            protection_setpoints,
            protection,
            energy,
            backlight,
            output_on,
            output_mode,
            buzzer,
            power_on_boot,
            take_out,
        })
    }

    /// Patch one field of the cached snapshot after a successful write,
    /// without waiting for the next poll to confirm it.
    fn patch(&mut self, apply: impl FnOnce(&mut Snapshot)) {
        if let Some(snapshot) = self.snapshot.as_mut() {
            apply(snapshot);
            self.updates.send_replace(Some(*snapshot));
        }
    }

    pub async fn set_voltage(&mut self, volts: f64) -> Result<()> {
        self.device.set_voltage(volts).await?;
        self.patch(|s| s.setpoints.voltage = volts);
        Ok(())
    }

    pub async fn set_current(&mut self, amps: f64) -> Result<()> {
        self.device.set_current(amps).await?;
        self.patch(|s| s.setpoints.current = amps);
        Ok(())
    }

    pub async fn set_ovp(&mut self, volts: f64) -> Result<()> {
        self.device.set_ovp(volts).await?;
        self.patch(|s| s.protection_setpoints.ovp_voltage = volts);
        Ok(())
    }

    pub async fn set_ocp(&mut self, amps: f64) -> Result<()> {
        self.device.set_ocp(amps).await?;
        self.patch(|s| s.protection_setpoints.ocp_current = amps);
        Ok(())
    }

    pub async fn set_backlight(&mut self, level: u16) -> Result<()> {
        self.device.set_backlight(level).await?;
        self.patch(|s| s.backlight = level);
        Ok(())
    }

    pub async fn set_output(&mut self, on: bool) -> Result<()> {
        self.device.set_output(on).await?;
        self.patch(|s| s.output_on = on);
        Ok(())
    }

    pub async fn set_buzzer(&mut self, on: bool) -> Result<()> {
        self.device.set_buzzer(on).await?;
        self.patch(|s| s.buzzer = on);
        Ok(())
    }

    pub async fn set_power_on_boot(&mut self, on: bool) -> Result<()> {
        self.device.set_power_on_boot(on).await?;
        self.patch(|s| s.power_on_boot = on);
        Ok(())
    }

    pub async fn set_take_out(&mut self, on: bool) -> Result<()> {
        self.device.set_take_out(on).await?;
        self.patch(|s| s.take_out = on);
        Ok(())
    }

    /// Re-enable polling after [`Self::disable_connection`]. Clears the
    /// failure counter so the device gets a fresh tolerance window, and
    /// nudges the poll loop rather than waiting out the interval.
    pub fn enable_connection(&mut self) {
        self.connection_enabled = true;
        self.consecutive_errors = 0;
        self.poll_nudge.notify_one();
    }

    /// Stop polling and tear the link down. Teardown is best-effort.
    pub async fn disable_connection(&mut self) {
        self.connection_enabled = false;
        self.device.disconnect().await;
        self.state = ConnectionState::Disconnected;
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connection_enabled(&self) -> bool {
        self.connection_enabled
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot
    }

    /// Subscribe to snapshot updates, both polled and write-patched.
    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.updates.subscribe()
    }

    /// Notified when a poll should run ahead of schedule.
    pub fn poll_nudge(&self) -> Arc<Notify> {
        Arc::clone(&self.poll_nudge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_transport::MockTransport;
    use crate::types::{OutputMode, ProtectionStatus};

    /// Queue replies for one full poll: thirteen read commands in a fixed
    /// order.
    fn script_poll(mock: &MockTransport) {
        mock.expect_read_reply(&[1205, 1500, 0, 1807]); // vout, iout, power
        mock.expect_read_reply(&[1210, 2000]); // vset, iset
        mock.expect_read_reply(&[31, 65_535]); // internal temp, no probe
        mock.expect_read_reply(&[2405]); // input voltage
        mock.expect_read_reply(&[1300, 2500]); // ovp, ocp
        mock.expect_read_reply(&[0]); // protection status
        mock.expect_read_reply(&[0, 1000, 0, 2500]); // Ah, Wh pairs
        mock.expect_read_reply(&[4]); // backlight
        mock.expect_read_reply(&[1]); // output state
        mock.expect_read_reply(&[0]); // output mode
        mock.expect_read_reply(&[0]); // buzzer
        mock.expect_read_reply(&[1]); // power on boot
        mock.expect_read_reply(&[0]); // take out
    }

    fn coordinator(mock: &MockTransport) -> Coordinator<MockTransport> {
        Coordinator::new(Rk6006::new(mock.clone()))
    }

    #[tokio::test]
    async fn refresh_polls_everything_into_a_snapshot() {
        let mock = MockTransport::new();
        script_poll(&mock);

        let mut coordinator = coordinator(&mock);
        let snapshot = coordinator.refresh().await.unwrap();

        assert_eq!(snapshot.output.voltage, 12.05);
        assert_eq!(snapshot.output.current, 1.5);
        assert_eq!(snapshot.output.power, 18.07);
        assert_eq!(snapshot.setpoints.voltage, 12.1);
        assert_eq!(snapshot.setpoints.current, 2.0);
        assert_eq!(snapshot.temperatures.internal, 31.0);
        assert_eq!(snapshot.temperatures.external, None);
        assert_eq!(snapshot.input_voltage, 24.05);
        assert_eq!(snapshot.protection_setpoints.ovp_voltage, 13.0);
        assert_eq!(snapshot.protection_setpoints.ocp_current, 2.5);
        assert_eq!(snapshot.protection, ProtectionStatus::None);
        assert_eq!(snapshot.energy.amp_hours, 1.0);
        assert_eq!(snapshot.energy.watt_hours, 2.5);
        assert_eq!(snapshot.backlight, 4);
        assert!(snapshot.output_on);
        assert_eq!(snapshot.output_mode, OutputMode::ConstantVoltage);
        assert!(!snapshot.buzzer);
        assert!(snapshot.power_on_boot);
        assert!(!snapshot.take_out);

        assert_eq!(coordinator.state(), ConnectionState::Connected);
        assert_eq!(mock.written().len(), 13);
        assert_eq!(mock.connects(), 1);
    }

    #[tokio::test]
    async fn disabled_connection_refuses_without_io() {
        let mock = MockTransport::new();
        let mut coordinator = coordinator(&mock);
        coordinator.disable_connection().await;

        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionDisabled));
        assert!(mock.written().is_empty());
        assert_eq!(mock.connects(), 0);
    }

    #[tokio::test]
    async fn connect_failure_counts_toward_tolerance() {
        let mock = MockTransport::new();
        mock.set_fail_connect(true);

        let mut coordinator = coordinator(&mock);
        for _ in 0..2 {
            assert!(coordinator.refresh().await.is_err());
            assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        }

        mock.set_fail_connect(false);
        script_poll(&mock);
        assert!(coordinator.refresh().await.is_ok());
        assert_eq!(coordinator.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn first_poll_failure_with_nothing_cached_is_an_error() {
        let mock = MockTransport::new();
        mock.expect_silence();

        let mut coordinator = coordinator(&mock);
        assert!(coordinator.refresh().await.is_err());
        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert!(coordinator.snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn brief_drops_serve_the_cached_snapshot() {
        let mock = MockTransport::new();
        script_poll(&mock);

        let mut coordinator = coordinator(&mock);
        let first = coordinator.refresh().await.unwrap();

        // Two consecutive failures stay within tolerance and keep serving
        // the cached readings; the third is a hard failure.
        for _ in 0..2 {
            mock.expect_silence();
            let cached = coordinator.refresh().await.unwrap();
            assert_eq!(cached, first);
            assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        }

        mock.expect_silence();
        assert!(coordinator.refresh().await.is_err());

        // A successful poll resets the tolerance window.
        script_poll(&mock);
        assert!(coordinator.refresh().await.is_ok());
        assert_eq!(coordinator.state(), ConnectionState::Connected);

        mock.expect_silence();
        let cached = coordinator.refresh().await.unwrap();
        assert_eq!(cached.output.voltage, 12.05);
    }

    #[tokio::test]
    async fn writes_patch_the_snapshot_and_notify_subscribers() {
        let mock = MockTransport::new();
        script_poll(&mock);

        let mut coordinator = coordinator(&mock);
        let mut updates = coordinator.subscribe();
        coordinator.refresh().await.unwrap();
        assert!(updates.has_changed().unwrap());
        updates.mark_unchanged();

        mock.expect_echo();
        coordinator.set_voltage(13.0).await.unwrap();

        let patched = (*updates.borrow_and_update()).unwrap();
        assert_eq!(patched.setpoints.voltage, 13.0);
        // Only the written field moves; the rest is still the polled data.
        assert_eq!(patched.output.voltage, 12.05);
        assert_eq!(coordinator.snapshot().unwrap().setpoints.voltage, 13.0);
    }

    #[tokio::test]
    async fn each_write_patches_its_own_field() {
        let mock = MockTransport::new();
        script_poll(&mock);

        let mut coordinator = coordinator(&mock);
        coordinator.refresh().await.unwrap();

        for _ in 0..5 {
            mock.expect_echo();
        }
        coordinator.set_current(1.2).await.unwrap();
        coordinator.set_ovp(14.0).await.unwrap();
        coordinator.set_ocp(3.0).await.unwrap();
        coordinator.set_backlight(2).await.unwrap();
        coordinator.set_output(false).await.unwrap();

        let snapshot = coordinator.snapshot().unwrap();
        assert_eq!(snapshot.setpoints.current, 1.2);
        assert_eq!(snapshot.protection_setpoints.ovp_voltage, 14.0);
        assert_eq!(snapshot.protection_setpoints.ocp_current, 3.0);
        assert_eq!(snapshot.backlight, 2);
        assert!(!snapshot.output_on);
    }

    #[tokio::test]
    async fn failed_write_leaves_the_snapshot_alone() {
        let mock = MockTransport::new();
        script_poll(&mock);

        let mut coordinator = coordinator(&mock);
        let before = coordinator.refresh().await.unwrap();

        mock.set_fail_write(true);
        assert!(coordinator.set_voltage(13.0).await.is_err());
        assert_eq!(coordinator.snapshot().unwrap(), before);
    }

    #[tokio::test]
    async fn write_before_any_poll_does_not_invent_a_snapshot() {
        let mock = MockTransport::new();
        let mut coordinator = coordinator(&mock);
        coordinator.device.connect().await.unwrap();

        mock.expect_echo();
        coordinator.set_voltage(5.0).await.unwrap();
        assert!(coordinator.snapshot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn enable_resets_the_tolerance_window_and_nudges() {
        let mock = MockTransport::new();
        script_poll(&mock);

        let mut coordinator = coordinator(&mock);
        coordinator.refresh().await.unwrap();

        for _ in 0..2 {
            mock.expect_silence();
            coordinator.refresh().await.unwrap();
        }

        let nudge = coordinator.poll_nudge();
        let notified = nudge.notified();
        coordinator.disable_connection().await;
        assert!(!coordinator.connection_enabled());
        coordinator.enable_connection();
        assert!(coordinator.connection_enabled());
        notified.await;

        // The two earlier failures no longer count toward the tolerance.
        mock.expect_silence();
        assert!(coordinator.refresh().await.is_ok());
    }

    #[tokio::test]
    async fn disable_tears_the_link_down() {
        let mock = MockTransport::new();
        script_poll(&mock);

        let mut coordinator = coordinator(&mock);
        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.state(), ConnectionState::Connected);

        coordinator.disable_connection().await;
        assert_eq!(coordinator.state(), ConnectionState::Disconnected);
        assert!(matches!(
            coordinator.refresh().await.unwrap_err(),
            Error::ConnectionDisabled
        ));
    }
}
