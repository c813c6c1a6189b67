//! Error types for RK6006 communications.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// A malformed or corrupted response frame. Always fatal to the command it
/// belongs to; the command is never retried.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    #[error("response shorter than the minimum frame length")]
    TooShort,
    #[error("response CRC mismatch: computed {computed:#06x}, received {received:#06x}")]
    CrcMismatch { computed: u16, received: u16 },
    #[error("response carries {got} payload bytes, expected {expected}")]
    ByteCountMismatch { expected: u8, got: u8 },
    #[error("unexpected function code {0:#04x}")]
    UnexpectedFunction(u8),
}

/// A failure of the duplex channel. Any of these marks the session as
/// disconnected; the coordinator decides whether and when to reconnect.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    ConnectFailed(String),
    #[error("write failed: {0}")]
    WriteFailed(String),
    #[error("disconnect failed: {0}")]
    DisconnectFailed(String),
    #[error("no response within the command timeout")]
    Timeout,
    #[error("transport disconnected")]
    Disconnected,
}

/// The lower-layer failure modes surfaced through [`Error::Communication`].
#[derive(Error, Debug)]
pub enum CommError {
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Crate-level error type for RK6006 operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A frame or transport failure while talking to the device.
    #[error("device communication failed")]
    Communication(#[source] CommError),
    /// The user has disabled the connection; not a device fault.
    #[error("connection is disabled")]
    ConnectionDisabled,
    /// Rejected before any I/O took place.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl From<FrameError> for Error {
    fn from(err: FrameError) -> Self {
        Error::Communication(CommError::Frame(err))
    }
}

impl From<TransportError> for Error {
    fn from(err: TransportError) -> Self {
        Error::Communication(CommError::Transport(err))
    }
}
