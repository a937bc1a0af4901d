//! Motor status types decoded from telemetry frames.

use crate::error::ValidationError;
use crate::protocol::TelemetryFrame;

/// Speed magnitude at or beyond which the motor counts as turning.
pub const DIRECTION_THRESHOLD: i32 = 10;

/// Motor direction derived from a reported speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MotorDirection {
    /// Speed at or below -10.
    Reverse,
    /// Speed strictly between -10 and 10.
    Stop,
    /// Speed at or above 10.
    Forward,
}

impl MotorDirection {
    /// Classifies a speed value.
    #[must_use]
    pub const fn from_speed(speed: i32) -> Self {
        if speed <= -DIRECTION_THRESHOLD {
            Self::Reverse
        } else if speed >= DIRECTION_THRESHOLD {
            Self::Forward
        } else {
            Self::Stop
        }
    }
}

/// Status reported by the motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryStatus {
    /// The controller acknowledged the connection.
    Connected,
    /// Speed report.
    Speed {
        /// Raw speed value.
        value: i32,
        /// Direction derived from `value`.
        direction: MotorDirection,
    },
}

impl TelemetryStatus {
    /// Interprets a decoded frame.
    #[must_use]
    pub const fn from_frame(frame: &TelemetryFrame) -> Self {
        if frame.is_connect_ack() {
            Self::Connected
        } else {
            Self::Speed {
                value: frame.value,
                direction: MotorDirection::from_speed(frame.value),
            }
        }
    }
}

/// Allowed range for speed setpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeedRange {
    min: i32,
    max: i32,
}

impl Default for SpeedRange {
    fn default() -> Self {
        Self {
            min: -100,
            max: 100,
        }
    }
}

impl SpeedRange {
    /// Creates a range; `min` must be below `max`.
    pub fn new(min: i32, max: i32) -> Result<Self, ValidationError> {
        if min >= max {
            return Err(ValidationError::BadRange {
                start: f64::from(min),
                end: f64::from(max),
            });
        }
        Ok(Self { min, max })
    }

    /// Lower bound.
    #[must_use]
    pub const fn min(&self) -> i32 {
        self.min
    }

    /// Upper bound.
    #[must_use]
    pub const fn max(&self) -> i32 {
        self.max
    }

    /// Clamps a setpoint into the range.
    #[must_use]
    pub fn clamp(&self, speed: i32) -> i32 {
        speed.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_thresholds() {
        assert_eq!(MotorDirection::from_speed(-15), MotorDirection::Reverse);
        assert_eq!(MotorDirection::from_speed(-10), MotorDirection::Reverse);
        assert_eq!(MotorDirection::from_speed(-9), MotorDirection::Stop);
        assert_eq!(MotorDirection::from_speed(5), MotorDirection::Stop);
        assert_eq!(MotorDirection::from_speed(9), MotorDirection::Stop);
        assert_eq!(MotorDirection::from_speed(10), MotorDirection::Forward);
    }

    #[test]
    fn test_status_from_frame() {
        assert_eq!(
            TelemetryStatus::from_frame(&TelemetryFrame::new(2, 0)),
            TelemetryStatus::Connected
        );
        assert_eq!(
            TelemetryStatus::from_frame(&TelemetryFrame::new(0, -15)),
            TelemetryStatus::Speed {
                value: -15,
                direction: MotorDirection::Reverse
            }
        );
    }

    #[test]
    fn test_speed_range() {
        let range = SpeedRange::default();
        assert_eq!(range.min(), -100);
        assert_eq!(range.max(), 100);
        assert_eq!(range.clamp(250), 100);
        assert_eq!(range.clamp(-7), -7);

        assert!(SpeedRange::new(10, 10).is_err());
        assert!(SpeedRange::new(-5, 5).is_ok());
    }
}
