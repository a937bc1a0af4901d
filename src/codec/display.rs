//! Display projections for the send and receive areas.
//!
//! The send area keeps one source of truth, the literal text in a
//! [`SendBuffer`]. The marker view, the grouped hex view and the bytes that
//! go on the wire are all computed from it on demand.

use bytes::Bytes;
use chrono::{Local, NaiveTime};

use super::{group_pairs, normalize_hex, text_to_hex};
use crate::error::{Result, ValidationError};

/// Visible stand-in for a blank line in the display view.
pub const MARKER: &str = "[\\n]";

/// Raw inbound volume after which an auto-clearing [`ReceiveLog`] empties itself.
pub const DEFAULT_RECEIVE_LIMIT: usize = 512 * 1024;

/// Renders literal text with blank lines replaced by [`MARKER`] lines.
///
/// Non-empty lines keep their content and are followed by a newline unless
/// they are the last line. A buffer made only of newlines yields one marker
/// per newline, so `"\n\n"` gives two markers and `""` gives nothing.
#[must_use]
pub fn to_display(actual: &str) -> String {
    let lines: Vec<&str> = actual.split('\n').collect();
    let mut out = String::with_capacity(actual.len() + MARKER.len());

    if lines.iter().all(|line| line.is_empty()) {
        for _ in 1..lines.len() {
            out.push_str(MARKER);
            out.push('\n');
        }
        return out;
    }

    let last = lines.len() - 1;
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            out.push_str(MARKER);
            out.push('\n');
        } else {
            out.push_str(line);
            if i < last {
                out.push('\n');
            }
        }
    }
    out
}

/// Maps a cursor in an edited hex field onto its regrouped text.
///
/// Offsets are in characters. The cursor lands after the same number of hex
/// digits it followed before, accounting for one separator per full pair.
#[must_use]
pub fn cursor_repair(old_text: &str, old_cursor: usize, new_text: &str) -> usize {
    let digits_before = old_text
        .chars()
        .take(old_cursor)
        .filter(|c| *c != ' ')
        .count();
    (digits_before + digits_before / 2).min(new_text.chars().count())
}

/// Result of regrouping an edited hex field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexEdit {
    /// Grouped text to show.
    pub text: String,
    /// Digits without separators.
    pub canonical: String,
    /// Repaired cursor offset into `text`.
    pub cursor: usize,
}

/// Regroups an edited hex field into pairs and repairs the cursor.
#[must_use]
pub fn reformat_hex(text: &str, cursor: usize) -> HexEdit {
    let canonical = text.replace(' ', "");
    let grouped = group_pairs(&canonical);
    let cursor = cursor_repair(text, cursor, &grouped);
    HexEdit {
        text: grouped,
        canonical,
        cursor,
    }
}

/// Grouped hex view of a piece of text.
#[must_use]
pub fn sync_text_to_hex(text: &str) -> String {
    group_pairs(&text_to_hex(text))
}

/// How the send area is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// Send the literal text as UTF-8.
    #[default]
    Text,
    /// Send the hex field decoded to bytes.
    Hex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HexSource {
    /// Follows the text.
    Synced,
    /// Typed by the user, digits without separators.
    Manual(String),
}

/// The send area: literal text plus either a synced or a hand-typed hex field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendBuffer {
    text: String,
    hex: HexSource,
}

impl Default for SendBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl SendBuffer {
    /// Creates an empty buffer with an independent hex field.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            text: String::new(),
            hex: HexSource::Manual(String::new()),
        }
    }

    /// Replaces the literal text.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// The literal text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The text with blank lines shown as markers.
    #[must_use]
    pub fn display(&self) -> String {
        to_display(&self.text)
    }

    /// Turns text→hex synchronization on or off.
    ///
    /// Turning it off leaves an empty hand-typed hex field.
    pub fn set_sync(&mut self, enabled: bool) {
        self.hex = if enabled {
            HexSource::Synced
        } else {
            HexSource::Manual(String::new())
        };
    }

    /// Returns true if the hex field follows the text.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.hex == HexSource::Synced
    }

    /// Applies an edit of the hex field and returns the repaired cursor.
    ///
    /// Editing the hex field detaches it from the text.
    pub fn edit_hex(&mut self, text: &str, cursor: usize) -> usize {
        let edit = reformat_hex(text, cursor);
        self.hex = HexSource::Manual(edit.canonical);
        edit.cursor
    }

    /// Hex digits without separators.
    #[must_use]
    pub fn hex(&self) -> String {
        match &self.hex {
            HexSource::Synced => text_to_hex(&self.text),
            HexSource::Manual(digits) => digits.clone(),
        }
    }

    /// The hex field as shown, in space-separated pairs.
    #[must_use]
    pub fn hex_display(&self) -> String {
        group_pairs(&self.hex())
    }

    /// Bytes to transmit for the given mode.
    pub fn payload(&self, mode: SendMode) -> Result<Bytes> {
        let bytes = match mode {
            SendMode::Text => Bytes::copy_from_slice(self.text.as_bytes()),
            SendMode::Hex => Bytes::from(normalize_hex(&self.hex())?),
        };
        if bytes.is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }
        Ok(bytes)
    }
}

/// How inbound chunks are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReceiveOptions {
    /// Show bytes as grouped hex instead of text.
    pub hex: bool,
    /// Prefix each chunk with `[HH:MM:SS] `.
    pub timestamp: bool,
}

/// Renders an inbound chunk using the local wall clock for timestamps.
#[must_use]
pub fn render_received(data: &[u8], options: ReceiveOptions) -> String {
    render_received_at(data, options, Local::now().time())
}

/// Renders an inbound chunk with an explicit timestamp.
///
/// Hex chunks end with a separator so consecutive chunks stay apart.
#[must_use]
pub fn render_received_at(data: &[u8], options: ReceiveOptions, time: NaiveTime) -> String {
    let body = if options.hex {
        let mut grouped = group_pairs(&hex::encode(data));
        if !grouped.is_empty() {
            grouped.push(' ');
        }
        grouped
    } else {
        String::from_utf8_lossy(data).into_owned()
    };

    if options.timestamp {
        format!("[{}] {body}", time.format("%H:%M:%S"))
    } else {
        body
    }
}

/// Accumulated receive view.
#[derive(Debug, Clone)]
pub struct ReceiveLog {
    text: String,
    raw_bytes: usize,
    limit: usize,
    auto_clear: bool,
    options: ReceiveOptions,
}

impl Default for ReceiveLog {
    fn default() -> Self {
        Self::new(ReceiveOptions::default())
    }
}

impl ReceiveLog {
    /// Creates an empty log.
    #[must_use]
    pub const fn new(options: ReceiveOptions) -> Self {
        Self {
            text: String::new(),
            raw_bytes: 0,
            limit: DEFAULT_RECEIVE_LIMIT,
            auto_clear: false,
            options,
        }
    }

    /// Enables clearing once more than `limit` raw bytes were appended.
    #[must_use]
    pub const fn auto_clear(mut self, limit: usize) -> Self {
        self.auto_clear = true;
        self.limit = limit;
        self
    }

    /// Changes rendering for chunks appended from now on.
    pub fn set_options(&mut self, options: ReceiveOptions) {
        self.options = options;
    }

    /// Appends a chunk. Returns true if the log cleared itself afterwards.
    pub fn append(&mut self, data: &[u8]) -> bool {
        self.text.push_str(&render_received(data, self.options));
        self.raw_bytes += data.len();

        if self.auto_clear && self.raw_bytes > self.limit {
            tracing::debug!("receive log over {} bytes, clearing", self.limit);
            self.clear();
            return true;
        }
        false
    }

    /// Empties the log.
    pub fn clear(&mut self) {
        self.text.clear();
        self.raw_bytes = 0;
    }

    /// Rendered contents.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Raw bytes appended since the last clear.
    #[must_use]
    pub const fn raw_bytes(&self) -> usize {
        self.raw_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CodecError, Error};

    #[test]
    fn test_to_display_blank_lines() {
        assert_eq!(to_display("a\n\nb"), "a\n[\\n]\nb");
        assert_eq!(to_display("\nab"), "[\\n]\nab");
        assert_eq!(to_display("ab\n"), "ab\n[\\n]\n");
        assert_eq!(to_display("ab"), "ab");
    }

    #[test]
    fn test_to_display_only_newlines() {
        assert_eq!(to_display(""), "");
        assert_eq!(to_display("\n"), "[\\n]\n");
        // Three empty lines, two separators
        assert_eq!(to_display("\n\n"), "[\\n]\n[\\n]\n");
    }

    #[test]
    fn test_cursor_repair_after_typing() {
        // Typed a digit at the end of "48 65" → "48 656"
        let edit = reformat_hex("48 656", 6);
        assert_eq!(edit.text, "48 65 6");
        assert_eq!(edit.canonical, "48656");
        assert_eq!(edit.cursor, 7);
    }

    #[test]
    fn test_cursor_repair_mid_text() {
        // Inserted "f" after the first digit of "48 65"
        let edit = reformat_hex("4f8 65", 2);
        assert_eq!(edit.text, "4f 86 5");
        assert_eq!(edit.cursor, 3);
    }

    #[test]
    fn test_cursor_repair_clamps() {
        assert_eq!(cursor_repair("ab", 2, "a"), 1);
        assert_eq!(cursor_repair("", 0, ""), 0);
    }

    #[test]
    fn test_sync_text_to_hex() {
        assert_eq!(sync_text_to_hex("Hi"), "48 69");
        assert_eq!(sync_text_to_hex(""), "");
    }

    #[test]
    fn test_send_buffer_synced() {
        let mut buffer = SendBuffer::new();
        buffer.set_sync(true);
        buffer.set_text("ok\n");
        assert!(buffer.is_synced());
        assert_eq!(buffer.hex_display(), "6f 6b 0a");
        assert_eq!(buffer.display(), "ok\n[\\n]\n");
        assert_eq!(buffer.payload(SendMode::Hex).unwrap(), Bytes::from_static(b"ok\n"));
        assert_eq!(
            buffer.payload(SendMode::Text).unwrap(),
            Bytes::from_static(b"ok\n")
        );
    }

    #[test]
    fn test_send_buffer_manual_hex() {
        let mut buffer = SendBuffer::new();
        buffer.set_sync(true);
        let cursor = buffer.edit_hex("ABC", 3);
        assert!(!buffer.is_synced());
        assert_eq!(buffer.hex_display(), "AB C");
        assert_eq!(cursor, 4);
        assert_eq!(
            buffer.payload(SendMode::Hex).unwrap(),
            Bytes::from_static(&[0x0A, 0xBC])
        );
    }

    #[test]
    fn test_send_buffer_empty_payload() {
        let buffer = SendBuffer::new();
        assert!(matches!(
            buffer.payload(SendMode::Text),
            Err(Error::Validation(ValidationError::EmptyPayload))
        ));
        assert!(matches!(
            buffer.payload(SendMode::Hex),
            Err(Error::Validation(ValidationError::EmptyPayload))
        ));
    }

    #[test]
    fn test_send_buffer_invalid_hex() {
        let mut buffer = SendBuffer::new();
        buffer.edit_hex("4g", 2);
        assert!(matches!(
            buffer.payload(SendMode::Hex),
            Err(Error::Codec(CodecError::InvalidHex(_)))
        ));
    }

    #[test]
    fn test_render_received() {
        let time = NaiveTime::from_hms_opt(12, 34, 56).unwrap();
        let text = ReceiveOptions::default();
        assert_eq!(render_received_at(b"hi", text, time), "hi");

        let hex = ReceiveOptions {
            hex: true,
            timestamp: true,
        };
        assert_eq!(render_received_at(b"hi", hex, time), "[12:34:56] 68 69 ");
    }

    #[test]
    fn test_receive_log_auto_clear() {
        let mut log = ReceiveLog::new(ReceiveOptions::default()).auto_clear(4);
        assert!(!log.append(b"abc"));
        assert_eq!(log.text(), "abc");
        assert_eq!(log.raw_bytes(), 3);

        assert!(log.append(b"de"));
        assert_eq!(log.text(), "");
        assert_eq!(log.raw_bytes(), 0);
    }

    #[test]
    fn test_receive_log_without_auto_clear() {
        let mut log = ReceiveLog::default();
        for _ in 0..4 {
            assert!(!log.append(b"0123456789"));
        }
        assert_eq!(log.raw_bytes(), 40);
    }
}
