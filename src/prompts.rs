//! Prompt assembly for structured extraction.
//!
//! Centralising prompt construction here serves two purposes:
//!
//! 1. **Single source of truth**: the schema instruction appended to every
//!    system prompt lives in exactly one place.
//!
//! 2. **Testability**: unit tests can inspect the exact text a model would
//!    receive without spinning up a provider.
//!
//! ## Template syntax
//!
//! User prompt templates use brace placeholders: `{document}` is replaced
//! with the document text, `{{` and `}}` produce literal braces. Templates
//! are user-authored and frequently embed JSON examples with bare braces, so
//! a template that does not parse under those rules is never an error: the
//! `{document}` token is replaced literally and everything else is kept.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

/// Placeholder replaced by the document text.
pub const DOCUMENT_PLACEHOLDER: &str = "{document}";

/// Lead-in of the schema instruction appended to the system prompt.
pub const SCHEMA_INSTRUCTION_PREFIX: &str =
    "\n\nYou must respond with valid JSON that conforms to this schema:\n";

/// Why strict template formatting rejected a template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unknown placeholder '{{{0}}}'")]
    UnknownField(String),
    #[error("single '{{' encountered in format string")]
    UnmatchedOpen,
    #[error("single '}}' encountered in format string")]
    UnmatchedClose,
}

/// Strict formatting: `{document}` substituted, `{{`/`}}` unescaped, any
/// other placeholder or stray brace rejected.
pub fn format_template(template: &str, document: &str) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + document.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '{' => {
                let mut field = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => return Err(TemplateError::UnmatchedOpen),
                        Some(ch) => field.push(ch),
                    }
                }
                if field != "document" {
                    return Err(TemplateError::UnknownField(field));
                }
                out.push_str(document);
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '}' => return Err(TemplateError::UnmatchedClose),
            _ => out.push(c),
        }
    }
    Ok(out)
}

/// Render the user prompt. Never fails: on a formatting error the
/// placeholder is replaced literally.
pub fn render_user_prompt(template: &str, document: &str) -> String {
    match format_template(template, document) {
        Ok(prompt) => prompt,
        Err(e) => {
            warn!("Template formatting failed ({e}), using simple replacement");
            template.replace(DOCUMENT_PLACEHOLDER, document)
        }
    }
}

/// The schema pretty-printed with two-space indentation, keys in the order
/// the template declared them.
pub fn schema_instruction(schema: &Value) -> String {
    let rendered = serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!("{SCHEMA_INSTRUCTION_PREFIX}{rendered}")
}

/// System prompt with the schema instruction appended.
pub fn build_system_prompt(system_prompt: &str, schema: &Value) -> String {
    let mut prompt = String::from(system_prompt);
    prompt.push_str(&schema_instruction(schema));
    prompt
}
