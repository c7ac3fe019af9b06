//! Pipeline stages for conversion, text extraction and response handling.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and can be swapped (e.g. another PDF backend) without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! convert:       soffice ─────────────────────────────▶ conversions/
//! extract_text:  sniff ──▶ formats | decode | soffice ──▶ String
//! extract:       (prompts) ──▶ llm ──▶ postprocess ──▶ JSON
//! ```
//!
//! 1. [`soffice`]: run the external converter headless under a timeout
//! 2. [`sniff`]: classify a file by its bytes, never its extension
//! 3. [`formats`]: native PDF / Word / spreadsheet readers, run in
//!    `spawn_blocking` because the parsers are synchronous
//! 4. [`decode`]: tolerant multi-encoding text decoding
//! 5. [`postprocess`]: strip code fences, parse and validate model output

pub mod decode;
pub mod formats;
pub mod postprocess;
pub mod sniff;
pub mod soffice;
