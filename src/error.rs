//! Error types for the motorterm library.

use std::io;

use thiserror::Error;

use crate::scheduler::SchedulerKind;

/// The main error type for motorterm operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport (serial link) error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Hex/text conversion error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Rejected parameters.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Telemetry protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error outside the transport (e.g. reading a file to send).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Settings snapshot could not be (de)serialized.
    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),

    /// The other scheduler is running on this session.
    #[error("{active} scheduler is running")]
    SchedulerBusy { active: SchedulerKind },

    /// The session task is gone.
    #[error("session closed")]
    ChannelClosed,
}

/// Errors raised by a transport.
///
/// Kinds are split into fatal ones, which close the session, and
/// transient ones, which are reported but keep the port open.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The port is not open.
    #[error("port not open")]
    NotOpen,

    /// The port could not be opened.
    #[error("failed to open port: {0}")]
    OpenFailed(String),

    /// Writing failed or no bytes were accepted.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Reading failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// RTS/DTR could not be set.
    #[error("failed to set RTS/DTR: {0}")]
    LinesFailed(String),

    /// The device went away (unplugged, hung up).
    #[error("device lost: {0}")]
    ResourceLost(String),

    /// Access to the device was denied.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Anything the transport could not classify.
    #[error("unknown transport error: {0}")]
    Unknown(String),
}

/// Which direction an I/O error happened in, used for classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    /// Opening the device.
    Open,
    /// Reading from the device.
    Read,
    /// Writing to the device.
    Write,
}

impl TransportError {
    /// Returns true if this error must close the session.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::OpenFailed(_) | Self::ResourceLost(_) | Self::PermissionDenied(_)
        )
    }

    /// Classifies an I/O error raised while talking to the device.
    #[must_use]
    pub fn from_io(direction: IoDirection, err: &io::Error) -> Self {
        let reason = err.to_string();
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(reason),
            io::ErrorKind::NotFound
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => Self::ResourceLost(reason),
            _ => match direction {
                IoDirection::Open => Self::OpenFailed(reason),
                IoDirection::Read => Self::ReadFailed(reason),
                IoDirection::Write => Self::WriteFailed(reason),
            },
        }
    }

    /// Classifies an error returned by `tokio-serial` when opening a port.
    #[must_use]
    pub fn from_serial(err: &tokio_serial::Error) -> Self {
        let reason = err.description.clone();
        match err.kind {
            tokio_serial::ErrorKind::Io(io::ErrorKind::PermissionDenied) => {
                Self::PermissionDenied(reason)
            }
            tokio_serial::ErrorKind::NoDevice
            | tokio_serial::ErrorKind::InvalidInput
            | tokio_serial::ErrorKind::Unknown
            | tokio_serial::ErrorKind::Io(_) => Self::OpenFailed(reason),
        }
    }
}

/// Hex/text conversion errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The input contains something other than hex digits and whitespace.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The decoded bytes are not valid UTF-8 text.
    #[error("decoded bytes are not UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Parameter validation errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Range start is not below its end.
    #[error("start {start} must be less than end {end}")]
    BadRange { start: f64, end: f64 },

    /// Step is not strictly positive.
    #[error("step {0} must be greater than 0")]
    BadStep(f64),

    /// The sample grid is larger than allowed.
    #[error("{count} samples exceed the maximum of {max}")]
    TooManySamples { count: f64, max: usize },

    /// Generation produced no points.
    #[error("no samples generated")]
    NoSamples,

    /// Timer interval is below the hard floor.
    #[error("interval {got}ms is below the minimum of {min}ms")]
    IntervalTooShort { got: u32, min: u32 },

    /// Nothing to send.
    #[error("payload is empty")]
    EmptyPayload,

    /// A stored setting does not map to a serial parameter.
    #[error("invalid {field} setting {value:?}")]
    InvalidSetting { field: &'static str, value: String },
}

/// Telemetry protocol errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The frame body is not exactly two comma-separated integers.
    #[error("malformed frame: {0:?}")]
    MalformedFrame(String),
}

/// Result type alias for motorterm operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(TransportError::ResourceLost("gone".into()).is_fatal());
        assert!(TransportError::PermissionDenied("no".into()).is_fatal());
        assert!(TransportError::OpenFailed("busy".into()).is_fatal());
        assert!(!TransportError::WriteFailed("x".into()).is_fatal());
        assert!(!TransportError::ReadFailed("x".into()).is_fatal());
        assert!(!TransportError::LinesFailed("x".into()).is_fatal());
        assert!(!TransportError::Unknown("x".into()).is_fatal());
        assert!(!TransportError::NotOpen.is_fatal());
    }

    #[test]
    fn test_from_io() {
        let err = io::Error::new(io::ErrorKind::BrokenPipe, "unplugged");
        assert!(matches!(
            TransportError::from_io(IoDirection::Write, &err),
            TransportError::ResourceLost(_)
        ));

        let err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            TransportError::from_io(IoDirection::Read, &err),
            TransportError::PermissionDenied(_)
        ));

        let err = io::Error::new(io::ErrorKind::TimedOut, "slow");
        assert!(matches!(
            TransportError::from_io(IoDirection::Write, &err),
            TransportError::WriteFailed(_)
        ));
        assert!(matches!(
            TransportError::from_io(IoDirection::Read, &err),
            TransportError::ReadFailed(_)
        ));
    }

    #[test]
    fn test_from_serial() {
        let err = tokio_serial::Error::new(tokio_serial::ErrorKind::NoDevice, "missing");
        assert_eq!(
            TransportError::from_serial(&err),
            TransportError::OpenFailed("missing".into())
        );

        let err = tokio_serial::Error::new(
            tokio_serial::ErrorKind::Io(io::ErrorKind::PermissionDenied),
            "locked",
        );
        assert_eq!(
            TransportError::from_serial(&err),
            TransportError::PermissionDenied("locked".into())
        );
    }
}
