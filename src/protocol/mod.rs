//! Protocol definitions for the motor controller link.
//!
//! This module contains:
//! - Frame layout and encoding
//! - Command codes and host commands
//! - Inbound frame parsing

pub mod command;
pub mod frame;
pub mod parser;

pub use command::{FrameCommand, MotorCommand};
pub use frame::{FRAME_MARKER, TelemetryFrame, strip_marker};
pub use parser::{parse_body, parse_frame, parse_status};
