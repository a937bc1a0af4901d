//! Parsing of inbound telemetry frames.

use crate::error::ProtocolError;
use crate::types::TelemetryStatus;

use super::frame::{TelemetryFrame, strip_marker};

/// Parses the `<command>,<value>` body of a frame.
///
/// Surrounding whitespace (including the line terminator) is ignored, as is
/// whitespace around each token.
pub fn parse_body(body: &str) -> Result<TelemetryFrame, ProtocolError> {
    let malformed = || ProtocolError::MalformedFrame(body.to_owned());

    let parts: Vec<&str> = body.trim().split(',').collect();
    let [command, value] = parts.as_slice() else {
        return Err(malformed());
    };

    let command = command.trim().parse::<i32>().map_err(|_| malformed())?;
    let value = value.trim().parse::<i32>().map_err(|_| malformed())?;
    Ok(TelemetryFrame::new(command, value))
}

/// Parses an inbound chunk.
///
/// Returns `None` when the chunk is not a frame (no leading marker).
/// Invalid UTF-8 in the body is dropped before parsing.
#[must_use]
pub fn parse_frame(chunk: &[u8]) -> Option<Result<TelemetryFrame, ProtocolError>> {
    let body = strip_marker(chunk)?;
    let text: String = String::from_utf8_lossy(body)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect();
    Some(parse_body(&text))
}

/// Decodes a chunk into a status, logging and dropping malformed frames.
#[must_use]
pub fn parse_status(chunk: &[u8]) -> Option<TelemetryStatus> {
    match parse_frame(chunk)? {
        Ok(frame) => {
            tracing::trace!("telemetry frame {},{}", frame.command, frame.value);
            Some(TelemetryStatus::from_frame(&frame))
        }
        Err(e) => {
            tracing::warn!("dropping telemetry frame: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MotorDirection;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body("2,0"), Ok(TelemetryFrame::new(2, 0)));
        assert_eq!(parse_body(" 0 , -15 \r\n"), Ok(TelemetryFrame::new(0, -15)));
    }

    #[test]
    fn test_parse_body_malformed() {
        assert_eq!(
            parse_body("1"),
            Err(ProtocolError::MalformedFrame("1".into()))
        );
        assert!(parse_body("1,2,3").is_err());
        assert!(parse_body("a,2").is_err());
        assert!(parse_body("1,").is_err());
        assert!(parse_body("").is_err());
    }

    #[test]
    fn test_parse_frame() {
        assert_eq!(parse_frame(b"plain text"), None);
        assert_eq!(parse_frame(b"[M]:0,10\n"), Some(Ok(TelemetryFrame::new(0, 10))));
        assert!(matches!(parse_frame(b"[M]:1"), Some(Err(_))));
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status(b"[M]:2,0"), Some(TelemetryStatus::Connected));
        assert_eq!(
            parse_status(b"[M]:0,-15"),
            Some(TelemetryStatus::Speed {
                value: -15,
                direction: MotorDirection::Reverse
            })
        );
        assert_eq!(
            parse_status(b"[M]:0,10"),
            Some(TelemetryStatus::Speed {
                value: 10,
                direction: MotorDirection::Forward
            })
        );
        assert_eq!(
            parse_status(b"[M]:0,5"),
            Some(TelemetryStatus::Speed {
                value: 5,
                direction: MotorDirection::Stop
            })
        );
        assert_eq!(parse_status(b"[M]:1"), None);
        assert_eq!(parse_status(b"no marker"), None);
    }
}
