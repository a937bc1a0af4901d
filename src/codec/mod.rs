//! Text and hex conversions for the send and receive views.
//!
//! Everything here is a pure function. The canonical hex form is lower-case
//! without separators; the display form groups it into space-separated pairs.

pub mod display;

pub use display::{
    HexEdit, MARKER, ReceiveLog, ReceiveOptions, SendBuffer, SendMode, cursor_repair,
    reformat_hex, render_received, sync_text_to_hex, to_display,
};

use crate::error::CodecError;

/// Encodes text as canonical hex (UTF-8 bytes, lower-case, no spaces).
#[must_use]
pub fn text_to_hex(text: &str) -> String {
    hex::encode(text.as_bytes())
}

/// Groups a hex string into space-separated pairs (`"48656c"` → `"48 65 6c"`).
///
/// An odd trailing digit is kept as its own group.
#[must_use]
pub fn group_pairs(hex: &str) -> String {
    let chars: Vec<char> = hex.chars().collect();
    chars
        .chunks(2)
        .map(|pair| pair.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Removes all whitespace from a hex string.
#[must_use]
pub fn strip_whitespace(hex: &str) -> String {
    hex.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Normalizes and decodes a hex string.
///
/// Whitespace is stripped and an odd-length input is left-padded with a
/// single `0`, so `"ABC"` decodes as `0A BC`.
pub fn normalize_hex(hex: &str) -> Result<Vec<u8>, CodecError> {
    let mut compact = strip_whitespace(hex);
    if compact.len() % 2 != 0 {
        compact.insert(0, '0');
    }
    Ok(hex::decode(compact)?)
}

/// Decodes hex back into UTF-8 text.
pub fn hex_to_text(hex: &str) -> Result<String, CodecError> {
    let bytes = normalize_hex(hex)?;
    Ok(String::from_utf8(bytes)?)
}
