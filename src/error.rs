//! Error types for the edgequake-doc2json library.
//!
//! Internally every stage returns `Result<_, DocError>` and propagates with
//! `?`. The three public operations ([`crate::DocumentEngine::convert`],
//! [`crate::DocumentEngine::extract_text`] and
//! [`crate::StructuredExtractor::extract`]) never hand a `DocError` to the
//! caller directly: they fold it into a tagged outcome
//! ([`crate::output::ConversionOutcome`], [`crate::output::ExtractionOutcome`])
//! carrying the flat [`ErrorKind`] plus the rendered message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All errors raised inside the edgequake-doc2json library.
#[derive(Debug, Error)]
pub enum DocError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Requested target format is outside {pdf, txt, csv, html}.
    #[error("Unsupported output format: {format}")]
    UnsupportedFormat { format: String },

    // ── Converter errors ──────────────────────────────────────────────────
    /// The external converter exited non-zero, timed out, or produced nothing.
    #[error("{reason}")]
    ConversionFailed { reason: String },

    // ── Extractor errors ──────────────────────────────────────────────────
    /// No library path exists for a detected document family.
    #[error("{family} text extraction unavailable: {detail}")]
    ExtractorUnavailable { family: String, detail: String },

    /// A format parser rejected the document.
    #[error("{family} parsing failed: {detail}")]
    ParseFailed { family: String, detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// Model output was not JSON, or JSON that does not match the schema.
    #[error("Invalid JSON response: {detail}")]
    InvalidResponse { detail: String },

    /// Network or API-level failure talking to the provider.
    #[error("{provider} request failed: {message}")]
    Provider { provider: String, message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (join failure, panic inside a parser, …).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DocError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn provider(provider: impl Into<String>, message: impl fmt::Display) -> Self {
        DocError::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Classify this error into the flat taxonomy exposed on outcomes.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocError::NotFound { .. } => ErrorKind::NotFound,
            DocError::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            DocError::ConversionFailed { .. } => ErrorKind::ConversionFailed,
            DocError::ExtractorUnavailable { .. } | DocError::ParseFailed { .. } => {
                ErrorKind::ExtractorUnavailable
            }
            DocError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            DocError::Provider { .. } | DocError::InvalidConfig(_) => ErrorKind::ProviderError,
            DocError::Io { .. } | DocError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Serializable failure classification carried by every failed outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    UnsupportedFormat,
    ConversionFailed,
    ExtractorUnavailable,
    InvalidResponse,
    ProviderError,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::UnsupportedFormat => "unsupported_format",
            ErrorKind::ConversionFailed => "conversion_failed",
            ErrorKind::ExtractorUnavailable => "extractor_unavailable",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::ProviderError => "provider_error",
            ErrorKind::Internal => "internal",
        };
        f.write_str(s)
    }
}
