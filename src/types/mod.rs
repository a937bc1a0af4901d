//! Data types shared across the session.
//!
//! - Byte counters
//! - Motor status and speed limits

pub mod stats;
pub mod telemetry;

pub use stats::SessionStats;
pub use telemetry::{DIRECTION_THRESHOLD, MotorDirection, SpeedRange, TelemetryStatus};
