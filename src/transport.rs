//! The byte-duplex transport seam and the single-in-flight command session.
//!
//! A [`Transport`] is a connect/write/notify view of one BLE link; the
//! [`Session`] on top of it pairs each written request frame with the
//! response reassembled from notification fragments. The device cannot
//! handle overlapping commands, so the session holds an internal lock for
//! the whole exchange: a second caller queues behind the first instead of
//! interleaving with it.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::time::{Instant, timeout_at};

use crate::error::TransportError;
use crate::reassembly::ResponseAccumulator;

/// Default bounded wait for the device's response to one command.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Quiescence pause after each completed exchange. The device needs a short
/// breather between commands or it starts dropping them.
pub const COMMAND_GAP: Duration = Duration::from_millis(50);

/// A byte-oriented duplex channel to one device.
///
/// `connect` hands back the receiving half of the notification stream;
/// fragments arrive there in order and with arbitrary framing. The channel
/// closing signals a mid-session drop, which is how a parked waiter learns
/// the link is gone.
#[async_trait]
pub trait Transport: Send {
    async fn connect(&mut self) -> Result<mpsc::Receiver<Bytes>, TransportError>;

    async fn write_frame(&mut self, frame: &[u8]) -> Result<(), TransportError>;

    async fn disconnect(&mut self) -> Result<(), TransportError>;
}

struct Link<T> {
    transport: T,
    fragments: Option<mpsc::Receiver<Bytes>>,
}

/// Serializes commands over one [`Transport`], one in flight at a time.
pub struct Session<T: Transport> {
    link: Mutex<Link<T>>,
    // Side channel so teardown can reach a waiter that holds the link lock.
    cancel: watch::Sender<()>,
    response_timeout: Duration,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self::with_timeout(transport, DEFAULT_RESPONSE_TIMEOUT)
    }

    pub fn with_timeout(transport: T, response_timeout: Duration) -> Self {
        let (cancel, _) = watch::channel(());
        Self {
            link: Mutex::new(Link {
                transport,
                fragments: None,
            }),
            cancel,
            response_timeout,
        }
    }

    /// Establish the duplex channel. A no-op if the session already holds
    /// a live one.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let mut link = self.link.lock().await;
        if link.fragments.is_some() {
            return Ok(());
        }
        let fragments = link.transport.connect().await?;
        link.fragments = Some(fragments);
        Ok(())
    }

    /// Best-effort teardown. Teardown failures are logged and swallowed;
    /// disconnecting must never fail the caller.
    ///
    /// A waiter parked in [`Self::send_and_await`] is unblocked with
    /// [`TransportError::Disconnected`] instead of hanging until its
    /// timeout.
    pub async fn disconnect(&self) {
        self.cancel.send_replace(());
        let mut link = self.link.lock().await;
        link.fragments = None;
        if let Err(err) = link.transport.disconnect().await {
            tracing::debug!(error = %err, "ignoring transport teardown failure");
        }
    }

    /// Write `frame` and wait for the reassembled response.
    ///
    /// Holds the session lock for the full round trip plus the quiescence
    /// gap, so concurrent callers are strictly serialized and responses pair
    /// with requests by temporal order. Any transport failure leaves the
    /// session disconnected; the next `connect` re-establishes the channel.
    pub async fn send_and_await(&self, frame: &[u8]) -> Result<Vec<u8>, TransportError> {
        // Subscribe before anything awaits so a teardown racing the write
        // is still observed: a later subscribe would mark it already seen.
        let mut cancelled = self.cancel.subscribe();
        let mut link = self.link.lock().await;
        let link = &mut *link;
        let result = Self::exchange(link, frame, &mut cancelled, self.response_timeout).await;
        match result {
            Ok(response) => {
                tokio::time::sleep(COMMAND_GAP).await;
                Ok(response)
            }
            Err(err) => {
                link.fragments = None;
                Err(err)
            }
        }
    }

    async fn exchange(
        link: &mut Link<T>,
        frame: &[u8],
        cancelled: &mut watch::Receiver<()>,
        response_timeout: Duration,
    ) -> Result<Vec<u8>, TransportError> {
        let fragments = link
            .fragments
            .as_mut()
            .ok_or(TransportError::Disconnected)?;

        // Fragments left over from an earlier timed-out command must not be
        // paired with this one.
        while fragments.try_recv().is_ok() {}

        // The write itself can stall on a congested link, so it races the
        // cancel channel too; abandoning it mid-flight is fine because the
        // session is being torn down anyway.
        tokio::select! {
            _ = cancelled.changed() => return Err(TransportError::Disconnected),
            written = link.transport.write_frame(frame) => written?,
        }

        let deadline = Instant::now() + response_timeout;
        let mut accumulator = ResponseAccumulator::new();
        loop {
            tokio::select! {
                _ = cancelled.changed() => return Err(TransportError::Disconnected),
                received = timeout_at(deadline, fragments.recv()) => match received {
                    Err(_) => return Err(TransportError::Timeout),
                    Ok(None) => return Err(TransportError::Disconnected),
                    Ok(Some(fragment)) => {
                        if let Some(response) = accumulator.push(&fragment) {
                            return Ok(response);
                        }
                    }
                },
            }
        }
    }
}
