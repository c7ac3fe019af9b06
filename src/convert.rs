//! The document engine: format conversion and text extraction.
//!
//! ## Conversion
//!
//! ```text
//! input ──▶ exists? ──▶ format ok? ──▶ scratch dir ──▶ converter ──▶ conversions/{stem}_{fmt}.{ext}
//!           NotFound    Unsupported    (TempDir)       timeout       rename, copy fallback
//! ```
//!
//! The scratch directory is created inside the storage root so the final
//! move is a same-filesystem rename, and it is a [`tempfile::TempDir`], so it
//! is removed on every exit path including timeouts.
//!
//! ## Text extraction
//!
//! The family is sniffed from content ([`crate::pipeline::sniff`]) and each
//! family has one extractor. Failures degrade to an empty string; the
//! presentation path is the exception and returns the error message as text.

use crate::config::EngineConfig;
use crate::error::DocError;
use crate::output::{ConversionOutcome, ConvertedFile};
use crate::pipeline::formats::{self, PdfBackend};
use crate::pipeline::sniff::{self, DocumentFamily, SniffedDocument};
use crate::pipeline::soffice::{self, TargetFormat, SCRATCH_PREFIX};
use crate::pipeline::decode;
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Converts documents with the external converter and extracts plain text.
///
/// Cheap to share: hold one per process and call it from many tasks.
#[derive(Debug, Clone)]
pub struct DocumentEngine {
    config: EngineConfig,
    pdf_backend: PdfBackend,
}

impl DocumentEngine {
    /// Create an engine, probing for a PDF backend once.
    pub fn new(config: EngineConfig) -> Self {
        let pdf_backend = PdfBackend::probe(config.pdfium_lib_path.as_deref());
        Self::with_pdf_backend(config, pdf_backend)
    }

    /// Create an engine with an explicit PDF backend (skips the probe).
    pub fn with_pdf_backend(config: EngineConfig, pdf_backend: PdfBackend) -> Self {
        info!(
            "Document engine: storage={}, converter='{}', pdf={}",
            config.storage_root.display(),
            config.converter_program,
            pdf_backend.name()
        );
        Self {
            config,
            pdf_backend,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pdf_backend(&self) -> &PdfBackend {
        &self.pdf_backend
    }

    // ── Conversion ───────────────────────────────────────────────────────

    /// Convert `input` to `format` (`pdf`, `txt`, `csv` or `html`).
    ///
    /// Never fails: every error is folded into [`ConversionOutcome::Failure`].
    /// Converting the same input twice overwrites the earlier output.
    pub async fn convert(&self, input: impl AsRef<Path>, format: &str) -> ConversionOutcome {
        let input = input.as_ref();
        let result = self.try_convert(input, format).await;
        if let Err(ref e) = result {
            error!("Conversion of {} to '{}' failed: {}", input.display(), format, e);
        }
        ConversionOutcome::from_result(format, result)
    }

    async fn try_convert(&self, input: &Path, format: &str) -> Result<ConvertedFile, DocError> {
        if tokio::fs::metadata(input).await.is_err() {
            return Err(DocError::NotFound {
                path: input.to_path_buf(),
            });
        }
        let format = TargetFormat::parse(format)?;

        let conversions = self.config.conversions_dir();
        tokio::fs::create_dir_all(&conversions)
            .await
            .map_err(|e| DocError::io(&conversions, e))?;

        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(&self.config.storage_root)
            .map_err(|e| DocError::io(&self.config.storage_root, e))?;
        let scratch_path =
            std::path::absolute(scratch.path()).map_err(|e| DocError::io(scratch.path(), e))?;
        debug!("Scratch directory: {}", scratch_path.display());

        let produced = soffice::run_converter(&self.config, input, format, &scratch_path).await?;

        let dest = conversions.join(output_file_name(input, format));
        relocate(&produced, &dest).await?;
        let file_size = tokio::fs::metadata(&dest)
            .await
            .map_err(|e| DocError::io(&dest, e))?
            .len();

        info!(
            "Converted {} → {} ({} bytes)",
            input.display(),
            dest.display(),
            file_size
        );
        Ok(ConvertedFile {
            output_path: dest,
            file_size,
            format,
        })
    }

    /// Convert many files to one format, at most `concurrency` at a time.
    ///
    /// Outcomes are returned in input order.
    pub async fn convert_batch<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        format: &str,
        concurrency: usize,
    ) -> Vec<ConversionOutcome> {
        self.convert_batch_with_progress(inputs, format, concurrency, None)
            .await
    }

    /// [`DocumentEngine::convert_batch`] with progress events.
    pub async fn convert_batch_with_progress<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        format: &str,
        concurrency: usize,
        progress: Option<&ProgressCallback>,
    ) -> Vec<ConversionOutcome> {
        let total = inputs.len();
        info!(
            "Batch conversion: {} files → '{}' (concurrency {})",
            total, format, concurrency
        );
        if let Some(cb) = progress {
            cb.on_batch_start(total);
        }

        let outcomes: Vec<ConversionOutcome> =
            stream::iter(inputs.iter().enumerate().map(|(index, input)| {
                let input = input.as_ref();
                async move {
                    if let Some(cb) = progress {
                        cb.on_item_start(index, total, input);
                    }
                    let outcome = self.convert(input, format).await;
                    if let Some(cb) = progress {
                        cb.on_item_complete(index, total, &outcome);
                    }
                    outcome
                }
            }))
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let success_count = outcomes.iter().filter(|o| o.is_success()).count();
        info!("Batch finished: {}/{} succeeded", success_count, total);
        if let Some(cb) = progress {
            cb.on_batch_complete(total, success_count);
        }
        outcomes
    }

    // ── Text extraction ──────────────────────────────────────────────────

    /// Extract plain text from any supported document.
    ///
    /// Never fails. Unreadable or unsupported input yields `""`; a
    /// presentation that cannot be converted yields
    /// `"Error extracting PowerPoint text: <reason>"`. Callers must not treat
    /// non-empty text as proof of success.
    pub async fn extract_text(&self, file: impl AsRef<Path>) -> String {
        let path = file.as_ref();
        let doc = match sniff::sniff_path(path).await {
            Ok(doc) => doc,
            Err(e) => {
                error!("Text extraction failed for {}: {}", path.display(), e);
                return String::new();
            }
        };
        info!(
            "Extracting text from {} ({}, {})",
            path.display(),
            doc.mime,
            doc.family
        );

        if doc.family == DocumentFamily::Presentation {
            return match self.text_via_converter(path).await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Presentation text extraction failed: {}", e);
                    format!("Error extracting PowerPoint text: {e}")
                }
            };
        }

        match self.extract_family_text(&doc).await {
            Ok(text) => {
                debug!("Extracted {} chars from {}", text.len(), path.display());
                text
            }
            Err(e) => {
                error!("Text extraction failed for {}: {}", path.display(), e);
                String::new()
            }
        }
    }

    async fn extract_family_text(&self, doc: &SniffedDocument) -> Result<String, DocError> {
        let path = doc.path.as_path();
        match doc.family {
            DocumentFamily::Pdf => formats::pdf_text(&self.pdf_backend, path).await,
            // docx-rs reads OOXML only; legacy OLE `.doc` goes through the converter.
            DocumentFamily::Word if doc.mime == "application/msword" => {
                self.text_via_converter(path).await
            }
            DocumentFamily::Word => formats::word_text(path).await,
            DocumentFamily::Spreadsheet => formats::spreadsheet_text(path).await,
            DocumentFamily::Text => Ok(decode::safe_read_text(path).await),
            DocumentFamily::Presentation | DocumentFamily::Other => {
                self.text_via_converter(path).await
            }
        }
    }

    /// Convert to `txt` and read the result back.
    async fn text_via_converter(&self, path: &Path) -> Result<String, DocError> {
        let converted = self.try_convert(path, TargetFormat::Txt.as_str()).await?;
        Ok(decode::safe_read_text(&converted.output_path).await)
    }

    /// Read a text file with the encoding fallback chain.
    /// See [`decode::safe_read_text`].
    pub async fn safe_read_text(&self, path: impl AsRef<Path>) -> String {
        decode::safe_read_text(path.as_ref()).await
    }
}

/// `{stem}_{format}{ext}`, e.g. `report_pdf.pdf`.
fn output_file_name(input: &Path, format: TargetFormat) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{}_{}{}", stem, format.as_str(), format.extension())
}

/// Move `from` to `to`, replacing `to`. Falls back to copy + delete when a
/// rename is not possible (e.g. across filesystems).
async fn relocate(from: &Path, to: &Path) -> Result<(), DocError> {
    if tokio::fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(from, to)
        .await
        .map_err(|e| DocError::io(to, e))?;
    if let Err(e) = tokio::fs::remove_file(from).await {
        debug!("Could not remove {} after copy: {}", from.display(), e);
    }
    Ok(())
}

/// Paths in `dir` whose names start with the scratch prefix.
///
/// Used by the integration tests to check cleanup; not part of the API.
#[doc(hidden)]
pub fn leftover_scratch_dirs(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with(SCRATCH_PREFIX))
                .map(|e| e.path())
                .collect()
        })
        .unwrap_or_default()
}
