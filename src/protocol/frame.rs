//! Frame layout for the motor controller protocol.
//!
//! Frames are single ASCII lines:
//! ```text
//! ┌────────┬───────────┬───┬─────────┬──────┐
//! │ "[M]:" │  command  │ , │  value  │  \n  │
//! │ 4 bytes│  decimal  │   │ decimal │      │
//! └────────┴───────────┴───┴─────────┴──────┘
//! ```
//! Inbound chunks are only recognised when they start with the marker.

use bytes::{BufMut, Bytes, BytesMut};

use super::command::FrameCommand;

/// Literal prefix of every frame.
pub const FRAME_MARKER: &[u8] = b"[M]:";

/// One decoded `<command>,<value>` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryFrame {
    /// Command code.
    pub command: i32,
    /// Value, a speed for every command except the acknowledgement.
    pub value: i32,
}

impl TelemetryFrame {
    /// Creates a frame.
    #[must_use]
    pub const fn new(command: i32, value: i32) -> Self {
        Self { command, value }
    }

    /// Returns the known command, if any.
    #[must_use]
    pub const fn kind(&self) -> Option<FrameCommand> {
        FrameCommand::from_code(self.command)
    }

    /// Returns true if the device acknowledged the connection.
    #[must_use]
    pub const fn is_connect_ack(&self) -> bool {
        self.command == FrameCommand::Connected as i32
    }

    /// Encodes the frame including marker and trailing newline.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let body = format!("{},{}\n", self.command, self.value);
        let mut buf = BytesMut::with_capacity(FRAME_MARKER.len() + body.len());
        buf.put_slice(FRAME_MARKER);
        buf.put_slice(body.as_bytes());
        buf.freeze()
    }
}

/// Returns the frame body if the chunk starts with [`FRAME_MARKER`].
#[must_use]
pub fn strip_marker(chunk: &[u8]) -> Option<&[u8]> {
    chunk.strip_prefix(FRAME_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode() {
        let frame = TelemetryFrame::new(0, 42);
        assert_eq!(frame.encode(), Bytes::from_static(b"[M]:0,42\n"));
    }

    #[test]
    fn test_connect_ack() {
        assert!(TelemetryFrame::new(2, 0).is_connect_ack());
        assert!(!TelemetryFrame::new(0, 2).is_connect_ack());
        assert_eq!(TelemetryFrame::new(2, 0).kind(), Some(FrameCommand::Connected));
        assert_eq!(TelemetryFrame::new(9, 0).kind(), None);
    }

    #[test]
    fn test_strip_marker() {
        assert_eq!(strip_marker(b"[M]:0,5\r\n"), Some(&b"0,5\r\n"[..]));
        assert_eq!(strip_marker(b"hello"), None);
        assert_eq!(strip_marker(b"[M]"), None);
        // Marker must be at the start of the chunk
        assert_eq!(strip_marker(b"x[M]:0,5"), None);
    }
}
