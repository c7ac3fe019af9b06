//! Content sniffing: decide a document's family from its bytes.
//!
//! Uploaded files often arrive with a generic or wrong extension, so the
//! extension is never consulted. `infer` recognises the binary containers
//! (PDF, OOXML zips, OLE compound files); anything without a signature is
//! classified as text when its head looks like text.

use crate::error::DocError;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const MIME_EMPTY: &str = "application/x-empty";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

pub const MIME_ZIP: &str = "application/zip";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Bytes inspected by the text heuristic.
const TEXT_PROBE_LEN: usize = 8 * 1024;

/// Bytes scanned for zip entry names when refining a bare zip.
const ZIP_SCAN_LEN: usize = 64 * 1024;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";

const OOXML_PARTS: [(&[u8], &str); 3] = [
    (b"word/", MIME_DOCX),
    (b"xl/", MIME_XLSX),
    (b"ppt/", MIME_PPTX),
];

/// Extraction path selected for a sniffed document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFamily {
    Pdf,
    Word,
    Spreadsheet,
    Presentation,
    Text,
    /// No native extractor; goes through the external converter.
    Other,
}

impl DocumentFamily {
    pub fn from_mime(mime: &str) -> Self {
        match mime {
            "application/pdf" => DocumentFamily::Pdf,
            MIME_DOCX | "application/msword" => DocumentFamily::Word,
            MIME_XLSX | "application/vnd.ms-excel" | "application/vnd.oasis.opendocument.spreadsheet" => {
                DocumentFamily::Spreadsheet
            }
            MIME_PPTX | "application/vnd.ms-powerpoint" => DocumentFamily::Presentation,
            m if m.starts_with("text/") => DocumentFamily::Text,
            _ => DocumentFamily::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentFamily::Pdf => "PDF",
            DocumentFamily::Word => "Word",
            DocumentFamily::Spreadsheet => "spreadsheet",
            DocumentFamily::Presentation => "presentation",
            DocumentFamily::Text => "text",
            DocumentFamily::Other => "other",
        }
    }
}

impl fmt::Display for DocumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A file together with what its bytes say it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniffedDocument {
    pub path: PathBuf,
    pub mime: String,
    pub family: DocumentFamily,
}

/// Read `path` and classify it.
pub async fn sniff_path(path: &Path) -> Result<SniffedDocument, DocError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DocError::io(path, e))?;
    let mime = sniff_bytes(&bytes);
    let family = DocumentFamily::from_mime(&mime);
    debug!("Sniffed {} as {} ({})", path.display(), mime, family);
    Ok(SniffedDocument {
        path: path.to_path_buf(),
        mime,
        family,
    })
}

/// Media type of a byte buffer.
///
/// OLE detection (`.doc`, `.xls`, `.ppt`) walks the compound file directory,
/// so the whole buffer is handed to `infer` rather than just the head.
pub fn sniff_bytes(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return MIME_EMPTY.to_string();
    }
    let detected = infer::get(bytes).map(|kind| kind.mime_type());

    // infer only recognises OOXML when `[Content_Types].xml` leads the
    // archive; other writers order entries differently.
    if bytes.starts_with(ZIP_LOCAL_HEADER) && matches!(detected, None | Some(MIME_ZIP)) {
        if let Some(mime) = ooxml_from_zip_entries(bytes) {
            return mime.to_string();
        }
    }
    if let Some(mime) = detected {
        return mime.to_string();
    }
    let head = &bytes[..bytes.len().min(TEXT_PROBE_LEN)];
    if looks_like_text(head) {
        MIME_TEXT.to_string()
    } else {
        MIME_OCTET_STREAM.to_string()
    }
}

/// Walk zip local file headers and map the first OOXML part name found.
fn ooxml_from_zip_entries(bytes: &[u8]) -> Option<&'static str> {
    let limit = bytes.len().min(ZIP_SCAN_LEN);
    let mut offset = 0;
    while let Some(pos) = bytes[offset..limit]
        .windows(ZIP_LOCAL_HEADER.len())
        .position(|w| w == ZIP_LOCAL_HEADER)
    {
        let header = offset + pos;
        let name_len = bytes
            .get(header + 26..header + 28)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)?;
        let name = bytes.get(header + 30..header + 30 + name_len)?;
        if let Some((_, mime)) = OOXML_PARTS.iter().find(|(prefix, _)| name.starts_with(prefix)) {
            return Some(*mime);
        }
        offset = header + ZIP_LOCAL_HEADER.len();
    }
    None
}

/// No NUL bytes, and either valid UTF-8 (a sequence cut at the probe
/// boundary is tolerated) or at least 90% printable single-byte text.
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }

    let mut chunks = head.utf8_chunks().peekable();
    let mut utf8_ok = true;
    while let Some(chunk) = chunks.next() {
        if !chunk.invalid().is_empty() && chunks.peek().is_some() {
            utf8_ok = false;
            break;
        }
    }
    if utf8_ok {
        return true;
    }

    let printable = head
        .iter()
        .filter(|&&b| matches!(b, b'\t' | b'\n' | b'\r' | 0x20..=0x7e | 0x80..=0xff))
        .count();
    printable * 10 >= head.len() * 9
}
