//! Opportunistic byte-to-text rendering.

/// Render one incoming byte for display.
///
/// A byte that stands alone as valid UTF-8 is shown as text; anything else
/// is shown as a `\xNN` artifact so no data is silently dropped. Bytes are
/// rendered one at a time with no buffering, so a multi-byte sequence split
/// across polling cycles shows up as artifacts. That is an accepted display
/// quirk, not something this tool reassembles.
pub fn render(byte: u8) -> String {
    match std::str::from_utf8(std::slice::from_ref(&byte)) {
        Ok(text) => text.to_string(),
        Err(_) => format!("\\x{:02x}", byte),
    }
}
