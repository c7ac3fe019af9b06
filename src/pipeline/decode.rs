//! Tolerant text decoding for plain-text documents and converter output.
//!
//! Decoding walks an ordered list of encodings and returns the first one that
//! yields a string. Every decoder drops or maps undecodable bytes instead of
//! failing, so in practice the first entry (UTF-8) always wins and the rest
//! of the list only matters if a stricter decoder is ever slotted in front.

use std::path::Path;
use tracing::{debug, error};

/// Encodings tried, in order.
pub const FALLBACK_ENCODINGS: [TextEncoding; 5] = [
    TextEncoding::Utf8,
    TextEncoding::Utf8Sig,
    TextEncoding::Latin1,
    TextEncoding::Windows1252,
    TextEncoding::Iso8859_1,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// UTF-8, invalid sequences dropped. A BOM is kept as U+FEFF.
    Utf8,
    /// UTF-8 with a leading BOM stripped.
    Utf8Sig,
    /// One byte, one code point.
    Latin1,
    /// WHATWG windows-1252.
    Windows1252,
    /// Same mapping as [`TextEncoding::Latin1`]; listed under its own label.
    Iso8859_1,
}

impl TextEncoding {
    pub fn label(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf8Sig => "utf-8-sig",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Windows1252 => "cp1252",
            TextEncoding::Iso8859_1 => "iso-8859-1",
        }
    }

    /// Decode `bytes`; `None` means the decoder could not produce a string.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        let text = match self {
            TextEncoding::Utf8 => drop_invalid_utf8(bytes),
            TextEncoding::Utf8Sig => {
                drop_invalid_utf8(bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes))
            }
            TextEncoding::Latin1 | TextEncoding::Iso8859_1 => {
                bytes.iter().map(|&b| b as char).collect()
            }
            TextEncoding::Windows1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling(bytes)
                .0
                .into_owned(),
        };
        Some(text)
    }
}

/// Decode bytes with the fallback chain. Never fails.
pub fn decode_text(bytes: &[u8]) -> String {
    for encoding in FALLBACK_ENCODINGS {
        if let Some(text) = encoding.decode(bytes) {
            debug!("Decoded {} bytes as {}", bytes.len(), encoding.label());
            return text;
        }
    }
    drop_invalid_utf8(bytes)
}

/// Read a file as text with [`decode_text`].
///
/// A read failure is reported in-band as `"Error reading file: <reason>"`.
/// Callers feed the result straight into a prompt, and the message is more
/// useful to a reader of the extraction record than an empty string.
pub async fn safe_read_text(path: &Path) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => decode_text(&bytes),
        Err(e) => {
            error!("Error reading file {}: {}", path.display(), e);
            format!("Error reading file: {e}")
        }
    }
}

fn drop_invalid_utf8(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}
