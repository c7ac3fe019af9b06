//! Extraction templates: the task description handed to the model.
//!
//! A template is plain data, usually stored as JSON next to the documents it
//! applies to:
//!
//! ```json
//! {
//!   "name": "invoice",
//!   "system_prompt": "You extract invoice fields.",
//!   "user_prompt_template": "Extract the invoice data from:\n{document}",
//!   "json_schema": {"required": ["vendor", "total"],
//!                   "properties": {"vendor": {"type": "string"}, "total": {"type": "number"}}},
//!   "preferred_format": "text"
//! }
//! ```

use crate::error::DocError;
use crate::pipeline::soffice::TargetFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// `preferred_format` value that extracts text straight from the original.
pub const PLAIN_TEXT_FORMAT: &str = "text";

fn default_preferred_format() -> String {
    PLAIN_TEXT_FORMAT.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub system_prompt: String,
    /// May contain `{document}`; see [`crate::prompts`] for the syntax.
    pub user_prompt_template: String,
    pub json_schema: Value,
    /// `"text"` or a converter target format (`pdf`, `txt`, `csv`, `html`).
    #[serde(default = "default_preferred_format")]
    pub preferred_format: String,
}

/// Where the document text for a template comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextSource {
    /// Extract text from the original file.
    Original,
    /// Convert first, then extract text from the converted file.
    Converted(TargetFormat),
}

impl ExtractionTemplate {
    pub fn new(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt_template: impl Into<String>,
        json_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: None,
            system_prompt: system_prompt.into(),
            user_prompt_template: user_prompt_template.into(),
            json_schema,
            preferred_format: default_preferred_format(),
        }
    }

    pub fn with_preferred_format(mut self, format: impl Into<String>) -> Self {
        self.preferred_format = format.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Load a template from a JSON file.
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DocError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| DocError::io(path, e))?;
        serde_json::from_str(&raw).map_err(|e| {
            DocError::InvalidConfig(format!("Invalid template '{}': {}", path.display(), e))
        })
    }

    /// Resolve `preferred_format`.
    pub fn text_source(&self) -> Result<TextSource, DocError> {
        if self.preferred_format.trim().eq_ignore_ascii_case(PLAIN_TEXT_FORMAT) {
            return Ok(TextSource::Original);
        }
        TargetFormat::parse(&self.preferred_format).map(TextSource::Converted)
    }
}
