//! Command codes for the motor controller protocol.
//!
//! The first integer of every frame says what the second one means.

use bytes::Bytes;

use super::frame::TelemetryFrame;

/// Frame command codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FrameCommand {
    /// Speed setpoint (host → device) or speed report (device → host).
    Speed = 0,
    /// Connection request, sent by the host.
    Connect = 1,
    /// Connection acknowledgement, sent by the device.
    Connected = 2,
}

impl FrameCommand {
    /// Attempts to parse a command code.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Speed),
            1 => Some(Self::Connect),
            2 => Some(Self::Connected),
            _ => None,
        }
    }
}

impl From<FrameCommand> for i32 {
    fn from(cmd: FrameCommand) -> Self {
        cmd as Self
    }
}

/// Commands the host sends to the motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCommand {
    /// Ask the controller to acknowledge the link (`[M]:1,0`).
    Connect,
    /// Set the motor speed (`[M]:0,<speed>`).
    SetSpeed(i32),
}

impl MotorCommand {
    /// Returns the frame carrying this command.
    #[must_use]
    pub const fn frame(&self) -> TelemetryFrame {
        match *self {
            Self::Connect => TelemetryFrame::new(FrameCommand::Connect as i32, 0),
            Self::SetSpeed(speed) => TelemetryFrame::new(FrameCommand::Speed as i32, speed),
        }
    }

    /// Encodes the command as a newline-terminated wire frame.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        self.frame().encode()
    }
}
