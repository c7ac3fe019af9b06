//! Outcome values returned by the public operations.
//!
//! Each conversion or extraction attempt yields exactly one of these. They
//! serialize with a `status` tag so the API layer can store or return them
//! verbatim:
//!
//! ```json
//! {"status":"success","output_path":"storage/conversions/report_pdf.pdf","file_size":18234,"format":"pdf"}
//! {"status":"failure","kind":"not_found","error":"Input file not found: report.docx","format":"pdf"}
//! ```

use crate::error::{DocError, ErrorKind};
use crate::pipeline::soffice::TargetFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// A converted file that has been moved into durable storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertedFile {
    pub output_path: PathBuf,
    pub file_size: u64,
    pub format: TargetFormat,
}

/// Result of [`crate::DocumentEngine::convert`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionOutcome {
    Success {
        output_path: PathBuf,
        file_size: u64,
        format: TargetFormat,
    },
    Failure {
        kind: ErrorKind,
        error: String,
        /// The format as the caller requested it (may be unsupported).
        format: String,
    },
}

impl ConversionOutcome {
    pub(crate) fn from_result(requested: &str, result: Result<ConvertedFile, DocError>) -> Self {
        match result {
            Ok(file) => ConversionOutcome::Success {
                output_path: file.output_path,
                file_size: file.file_size,
                format: file.format,
            },
            Err(e) => ConversionOutcome::Failure {
                kind: e.kind(),
                error: e.to_string(),
                format: requested.to_string(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ConversionOutcome::Success { .. })
    }

    /// Path of the converted file, when the conversion succeeded.
    pub fn output_path(&self) -> Option<&Path> {
        match self {
            ConversionOutcome::Success { output_path, .. } => Some(output_path),
            ConversionOutcome::Failure { .. } => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ConversionOutcome::Success { .. } => None,
            ConversionOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ConversionOutcome::Success { .. } => None,
            ConversionOutcome::Failure { error, .. } => Some(error),
        }
    }

    /// Convert into a `Result`, for callers that prefer `?` control flow.
    pub fn into_result(self) -> Result<ConvertedFile, OutcomeError> {
        match self {
            ConversionOutcome::Success {
                output_path,
                file_size,
                format,
            } => Ok(ConvertedFile {
                output_path,
                file_size,
                format,
            }),
            ConversionOutcome::Failure { kind, error, .. } => Err(OutcomeError { kind, error }),
        }
    }
}

/// Result of [`crate::StructuredExtractor::extract`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    Success {
        /// Parsed model output; conforms to the template schema.
        data: Value,
        /// Unsanitized model text.
        raw_response: String,
        elapsed_ms: u64,
        model: String,
    },
    Failure {
        kind: ErrorKind,
        error: String,
        /// Unsanitized model text, when the model was reached.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        raw_response: Option<String>,
        elapsed_ms: u64,
        model: String,
    },
}

impl ExtractionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            ExtractionOutcome::Success { data, .. } => Some(data),
            ExtractionOutcome::Failure { .. } => None,
        }
    }

    pub fn raw_response(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Success { raw_response, .. } => Some(raw_response),
            ExtractionOutcome::Failure { raw_response, .. } => raw_response.as_deref(),
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            ExtractionOutcome::Success { .. } => None,
            ExtractionOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            ExtractionOutcome::Success { .. } => None,
            ExtractionOutcome::Failure { error, .. } => Some(error),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        match self {
            ExtractionOutcome::Success { elapsed_ms, .. }
            | ExtractionOutcome::Failure { elapsed_ms, .. } => *elapsed_ms,
        }
    }

    /// Whole seconds, as stored next to persisted extraction records.
    pub fn processing_time_seconds(&self) -> u64 {
        self.elapsed_ms() / 1000
    }

    pub fn model(&self) -> &str {
        match self {
            ExtractionOutcome::Success { model, .. } | ExtractionOutcome::Failure { model, .. } => {
                model
            }
        }
    }

    /// Convert into a `Result`, discarding timing and raw text.
    pub fn into_result(self) -> Result<Value, OutcomeError> {
        match self {
            ExtractionOutcome::Success { data, .. } => Ok(data),
            ExtractionOutcome::Failure { kind, error, .. } => Err(OutcomeError { kind, error }),
        }
    }
}

/// Error produced by the `into_result` helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {error}")]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub error: String,
}
