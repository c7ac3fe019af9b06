//! Native text extractors for the document families that have one.
//!
//! All parsers here are synchronous and CPU-bound, so each public entry point
//! reads the file and runs the parser inside `spawn_blocking`. A parser that
//! panics on a malformed file surfaces as a `JoinError`, which is mapped to
//! [`DocError::Internal`] like any other failure.

use crate::error::DocError;
use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};
use pdfium_render::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ── PDF ──────────────────────────────────────────────────────────────────

/// PDF text backend chosen once per engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfBackend {
    /// pdfium bound from this library (a file, or a directory holding the
    /// platform library). `None` binds the system library.
    Pdfium { library: Option<PathBuf> },
    /// Pure-Rust `pdf-extract`, used when no pdfium library can be bound.
    #[cfg(feature = "pdf-extract")]
    PdfExtract,
    /// Neither backend is usable; PDF text extraction yields nothing.
    Unavailable,
}

impl PdfBackend {
    /// Find a working backend: the configured pdfium path, then
    /// `PDFIUM_LIB_PATH`, then the system pdfium, then `pdf-extract`.
    pub fn probe(configured: Option<&Path>) -> Self {
        let env_path = std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from);
        let candidates = [configured.map(Path::to_path_buf), env_path]
            .into_iter()
            .flatten()
            .map(Some)
            .chain(std::iter::once(None));

        for library in candidates {
            match bind_pdfium(library.as_deref()) {
                Ok(_) => {
                    info!(
                        "PDF backend: pdfium ({})",
                        library
                            .as_deref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| "system library".into())
                    );
                    return PdfBackend::Pdfium { library };
                }
                Err(e) => debug!("pdfium not bindable from {:?}: {:?}", library, e),
            }
        }

        #[cfg(feature = "pdf-extract")]
        {
            info!("PDF backend: pdf-extract");
            PdfBackend::PdfExtract
        }
        #[cfg(not(feature = "pdf-extract"))]
        {
            tracing::warn!("No PDF backend available; PDF text extraction is disabled");
            PdfBackend::Unavailable
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PdfBackend::Pdfium { .. } => "pdfium",
            #[cfg(feature = "pdf-extract")]
            PdfBackend::PdfExtract => "pdf-extract",
            PdfBackend::Unavailable => "unavailable",
        }
    }
}

fn bind_pdfium(library: Option<&Path>) -> Result<Pdfium, PdfiumError> {
    let bindings = match library {
        Some(path) if path.is_dir() => {
            Pdfium::bind_to_library(&Pdfium::pdfium_platform_library_name_at_path(path))?
        }
        Some(path) => Pdfium::bind_to_library(path)?,
        None => Pdfium::bind_to_system_library()?,
    };
    Ok(Pdfium::new(bindings))
}

/// Concatenate the text of every page, one newline after each.
pub async fn pdf_text(backend: &PdfBackend, path: &Path) -> Result<String, DocError> {
    let backend = backend.clone();
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || match backend {
        PdfBackend::Pdfium { library } => pdfium_text_blocking(library.as_deref(), &path),
        #[cfg(feature = "pdf-extract")]
        PdfBackend::PdfExtract => pdf_extract_text_blocking(&path),
        PdfBackend::Unavailable => Err(DocError::ExtractorUnavailable {
            family: "PDF".into(),
            detail: "no pdfium library and pdf-extract is disabled".into(),
        }),
    })
    .await
    .map_err(|e| DocError::Internal(format!("PDF extraction task panicked: {e}")))?
}

fn pdfium_text_blocking(library: Option<&Path>, path: &Path) -> Result<String, DocError> {
    let pdfium = bind_pdfium(library).map_err(|e| DocError::ExtractorUnavailable {
        family: "PDF".into(),
        detail: format!("{:?}", e),
    })?;
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| pdf_parse_failed(format!("{:?}", e)))?;

    let mut text = String::new();
    for page in document.pages().iter() {
        let page_text = page
            .text()
            .map_err(|e| pdf_parse_failed(format!("{:?}", e)))?;
        text.push_str(&page_text.all());
        text.push('\n');
    }
    Ok(text)
}

#[cfg(feature = "pdf-extract")]
fn pdf_extract_text_blocking(path: &Path) -> Result<String, DocError> {
    let pages =
        pdf_extract::extract_text_by_pages(path).map_err(|e| pdf_parse_failed(e.to_string()))?;
    let mut text = String::new();
    for page in pages {
        text.push_str(&page);
        text.push('\n');
    }
    Ok(text)
}

fn pdf_parse_failed(detail: String) -> DocError {
    DocError::ParseFailed {
        family: "PDF".into(),
        detail,
    }
}

// ── Word ─────────────────────────────────────────────────────────────────

/// Text of every body paragraph, one newline after each (empty paragraphs
/// included). Table contents are not visited.
pub async fn word_text(path: &Path) -> Result<String, DocError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DocError::io(path, e))?;
    tokio::task::spawn_blocking(move || word_text_from_bytes(&bytes))
        .await
        .map_err(|e| DocError::Internal(format!("Word extraction task panicked: {e}")))?
}

pub(crate) fn word_text_from_bytes(bytes: &[u8]) -> Result<String, DocError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| DocError::ParseFailed {
        family: "Word".into(),
        detail: format!("{:?}", e),
    })?;

    let mut text = String::new();
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(paragraph) = child {
            text.push_str(&paragraph_text(paragraph));
            text.push('\n');
        }
    }
    Ok(text)
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        push_paragraph_child(child, &mut text);
    }
    text
}

fn push_paragraph_child(child: &ParagraphChild, out: &mut String) {
    match child {
        ParagraphChild::Run(run) => {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => out.push_str(&t.text),
                    RunChild::Tab(_) => out.push('\t'),
                    RunChild::Break(_) => out.push('\n'),
                    _ => {}
                }
            }
        }
        ParagraphChild::Hyperlink(link) => {
            for inner in &link.children {
                push_paragraph_child(inner, out);
            }
        }
        _ => {}
    }
}

// ── Spreadsheet ──────────────────────────────────────────────────────────

/// First worksheet rendered as a plain-text table: first row as header,
/// a zero-based row index on the left, right-aligned columns.
pub async fn spreadsheet_text(path: &Path) -> Result<String, DocError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| DocError::io(path, e))?;
    tokio::task::spawn_blocking(move || spreadsheet_text_from_bytes(bytes))
        .await
        .map_err(|e| DocError::Internal(format!("Spreadsheet extraction task panicked: {e}")))?
}

fn spreadsheet_text_from_bytes(bytes: Vec<u8>) -> Result<String, DocError> {
    use calamine::Reader;

    let parse_failed = |detail: String| DocError::ParseFailed {
        family: "spreadsheet".into(),
        detail,
    };

    // Format is detected from content; uploads rarely keep a usable extension.
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| parse_failed(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| parse_failed("workbook has no worksheets".into()))?
        .map_err(|e| parse_failed(e.to_string()))?;

    let rows: Vec<Vec<String>> = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect();
    Ok(render_table(&rows))
}

fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => "NaN".to_string(),
        other => other.to_string(),
    }
}

/// Render rows as a table. `rows[0]` is the header.
pub(crate) fn render_table(rows: &[Vec<String>]) -> String {
    let Some((header, body)) = rows.split_first() else {
        return "Empty DataFrame\nColumns: []\nIndex: []".to_string();
    };
    if body.is_empty() {
        return format!(
            "Empty DataFrame\nColumns: [{}]\nIndex: []",
            header.join(", ")
        );
    }

    let columns = header
        .len()
        .max(body.iter().map(Vec::len).max().unwrap_or(0));
    fn cell(row: &[String], c: usize) -> &str {
        row.get(c).map(String::as_str).unwrap_or("NaN")
    }

    let index_width = (body.len() - 1).to_string().len();
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            body.iter()
                .map(|r| cell(r, c).chars().count())
                .chain(std::iter::once(cell(header, c).chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(rows.len());
    let mut line = " ".repeat(index_width);
    for (c, width) in widths.iter().enumerate() {
        line.push_str(&format!("  {:>width$}", cell(header, c), width = width));
    }
    lines.push(line);

    for (i, row) in body.iter().enumerate() {
        let mut line = format!("{:>width$}", i, width = index_width);
        for (c, width) in widths.iter().enumerate() {
            line.push_str(&format!("  {:>width$}", cell(row, c), width = width));
        }
        lines.push(line);
    }
    lines.join("\n")
}
