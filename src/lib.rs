//! # edgequake-doc2json
//!
//! Normalise office documents to plain text and extract schema-validated
//! JSON records from them with an LLM.
//!
//! ## Why this crate?
//!
//! Documents arrive as `.docx`, `.xlsx`, `.pptx`, PDFs, legacy OLE files and
//! text in unknown encodings, often with a wrong extension. Before a model
//! can pull an invoice total out of one, something has to turn it into text,
//! and something has to turn the model's answer back into data a program can
//! trust. This crate is both halves:
//!
//! - [`DocumentEngine`] converts documents with LibreOffice (headless, one
//!   isolated scratch directory per call, hard timeout) and extracts text
//!   with native readers, falling back to the converter.
//! - [`StructuredExtractor`] assembles prompts from an [`ExtractionTemplate`],
//!   calls OpenAI, Anthropic or any `edgequake-llm` provider, strips Markdown
//!   fences from the answer and validates it against the template's schema.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Sniff    classify by content (PDF, Word, spreadsheet, slides, text)
//!  ├─ 2. Text     native reader, or LibreOffice → txt, or encoding fallback
//!  ├─ 3. Prompt   {document} substitution + schema instruction
//!  ├─ 4. LLM      one call through the configured adapter
//!  ├─ 5. Clean    strip ```json fences, parse JSON
//!  └─ 6. Check    required keys + string/number/array types
//! ```
//!
//! None of the three public operations fail: [`DocumentEngine::convert`]
//! and [`StructuredExtractor::extract`] return tagged outcomes, and
//! [`DocumentEngine::extract_text`] degrades to an empty string.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2json::{
//!     extract_from_file, DocumentEngine, EngineConfig, ExtractionTemplate, LlmConfig,
//!     StructuredExtractor,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = DocumentEngine::new(EngineConfig::default());
//!     // LLM_PROVIDER / LLM_MODEL / LLM_API_KEY / LLM_TEMPERATURE / LLM_MAX_TOKENS
//!     let extractor = StructuredExtractor::from_config(&LlmConfig::from_env()?)?;
//!
//!     let template = ExtractionTemplate::new(
//!         "invoice",
//!         "You extract invoice fields.",
//!         "Extract the invoice data from:\n{document}",
//!         json!({"required": ["vendor", "total"],
//!                "properties": {"vendor": {"type": "string"}, "total": {"type": "number"}}}),
//!     );
//!
//!     let outcome = extract_from_file(&engine, &extractor, "invoice.docx", &template).await;
//!     println!("{}", serde_json::to_string_pretty(&outcome)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2json` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `pdf-extract` | on | Pure-Rust PDF text fallback when no pdfium library can be bound |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc2json = { version = "0.1", default-features = false, features = ["pdf-extract"] }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod template;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{EngineConfig, EngineConfigBuilder, LlmConfig, LlmConfigBuilder, ProviderKind};
pub use convert::DocumentEngine;
pub use error::{DocError, ErrorKind};
pub use extract::{extract_from_file, StructuredExtractor};
pub use llm::{GenerationRequest, TextGenerator};
pub use output::{ConversionOutcome, ConvertedFile, ExtractionOutcome, OutcomeError};
pub use pipeline::decode::{decode_text, safe_read_text};
pub use pipeline::soffice::TargetFormat;
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use template::{ExtractionTemplate, TextSource};
