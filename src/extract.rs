//! Structured extraction: document text + template → validated JSON.
//!
//! ```text
//! template ──▶ prompts ──▶ TextGenerator ──▶ sanitize ──▶ parse ──▶ validate ──▶ outcome
//! ```
//!
//! Each call is one best-effort attempt. Nothing is retried here: a retry
//! policy belongs to the provider client or the caller.

use crate::config::LlmConfig;
use crate::convert::DocumentEngine;
use crate::error::{DocError, ErrorKind};
use crate::llm::{build_generator, GenerationRequest, TextGenerator};
use crate::output::{ConversionOutcome, ExtractionOutcome};
use crate::pipeline::postprocess;
use crate::prompts;
use crate::template::{ExtractionTemplate, TextSource};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Runs extraction requests against one configured provider.
#[derive(Clone)]
pub struct StructuredExtractor {
    generator: Arc<dyn TextGenerator>,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

impl std::fmt::Debug for StructuredExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuredExtractor")
            .field("provider", &self.generator.name())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl StructuredExtractor {
    /// Build the provider adapter selected by `config`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, DocError> {
        let generator = build_generator(config)?;
        Ok(Self::new(generator, config))
    }

    /// Use an existing generator with `config`'s model and sampling settings.
    pub fn new(generator: Arc<dyn TextGenerator>, config: &LlmConfig) -> Self {
        Self {
            generator,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_name(&self) -> &str {
        self.generator.name()
    }

    /// Ask the model for a record conforming to `schema`.
    ///
    /// Never fails. Parse and schema failures carry the raw model text;
    /// provider failures do not, since there is none.
    pub async fn extract(
        &self,
        text: &str,
        system_prompt: &str,
        user_prompt_template: &str,
        schema: &Value,
    ) -> ExtractionOutcome {
        let start = Instant::now();
        let user = prompts::render_user_prompt(user_prompt_template, text);
        let system = prompts::build_system_prompt(system_prompt, schema);
        let request = GenerationRequest {
            system: &system,
            user: &user,
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };
        info!(
            "Extracting with {} / {} ({} chars of document text)",
            self.generator.name(),
            self.model,
            text.len()
        );

        let generated = AssertUnwindSafe(self.generator.generate(&request))
            .catch_unwind()
            .await;
        let raw = match generated {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                error!("LLM extraction failed: {}", e);
                return self.failure(e.kind(), e.to_string(), None, start);
            }
            Err(_) => {
                error!("LLM provider panicked");
                return self.failure(
                    ErrorKind::Internal,
                    "LLM provider panicked".to_string(),
                    None,
                    start,
                );
            }
        };
        debug!("Raw LLM response: {}", preview(&raw));

        match postprocess::parse_response(&raw, schema) {
            Ok(data) => ExtractionOutcome::Success {
                data,
                raw_response: raw,
                elapsed_ms: elapsed_ms(start),
                model: self.model.clone(),
            },
            Err(e) => {
                error!("Invalid JSON response from LLM: {}", e);
                self.failure(e.kind(), e.to_string(), Some(raw), start)
            }
        }
    }

    /// [`StructuredExtractor::extract`] with the prompts and schema of `template`.
    pub async fn extract_with_template(
        &self,
        text: &str,
        template: &ExtractionTemplate,
    ) -> ExtractionOutcome {
        self.extract(
            text,
            &template.system_prompt,
            &template.user_prompt_template,
            &template.json_schema,
        )
        .await
    }

    fn failure(
        &self,
        kind: ErrorKind,
        error: String,
        raw_response: Option<String>,
        start: Instant,
    ) -> ExtractionOutcome {
        ExtractionOutcome::Failure {
            kind,
            error,
            raw_response,
            elapsed_ms: elapsed_ms(start),
            model: self.model.clone(),
        }
    }
}

/// Run a template against a file end to end.
///
/// With `preferred_format = "text"` the text comes straight from `file`;
/// otherwise `file` is converted first and the text is extracted from the
/// converted output. A missing file or failed conversion short-circuits
/// before the model is called.
pub async fn extract_from_file(
    engine: &DocumentEngine,
    extractor: &StructuredExtractor,
    file: impl AsRef<Path>,
    template: &ExtractionTemplate,
) -> ExtractionOutcome {
    let start = Instant::now();
    let file = file.as_ref();
    info!("Running template '{}' on {}", template.name, file.display());

    if tokio::fs::metadata(file).await.is_err() {
        let e = DocError::NotFound {
            path: file.to_path_buf(),
        };
        return extractor.failure(e.kind(), e.to_string(), None, start);
    }

    let source = match template.text_source() {
        Ok(source) => source,
        Err(e) => return extractor.failure(e.kind(), e.to_string(), None, start),
    };

    let text = match source {
        TextSource::Original => engine.extract_text(file).await,
        TextSource::Converted(format) => match engine.convert(file, format.as_str()).await {
            ConversionOutcome::Success { output_path, .. } => {
                engine.extract_text(&output_path).await
            }
            ConversionOutcome::Failure { kind, error, .. } => {
                return extractor.failure(
                    kind,
                    format!("Conversion failed: {error}"),
                    None,
                    start,
                );
            }
        },
    };

    extractor.extract_with_template(&text, template).await
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn preview(s: &str) -> &str {
    match s.char_indices().nth(200) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    struct Canned {
        reply: Result<String, String>,
        seen: Mutex<Vec<(String, String)>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextGenerator for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, DocError> {
            self.seen
                .lock()
                .unwrap()
                .push((request.system.to_string(), request.user.to_string()));
            self.reply
                .clone()
                .map_err(|m| DocError::provider("canned", m))
        }
    }

    fn extractor(generator: Arc<dyn TextGenerator>) -> StructuredExtractor {
        StructuredExtractor::new(generator, &LlmConfig::default())
    }

    #[tokio::test]
    async fn prompts_reach_the_generator() {
        let canned = Canned::ok("{\"vendor\": \"Acme\"}");
        let outcome = extractor(canned.clone())
            .extract("Hello", "Find the vendor.", "Doc: {document}", &json!({"required": ["vendor"]}))
            .await;
        assert!(outcome.is_success());

        let seen = canned.seen.lock().unwrap();
        assert_eq!(seen[0].1, "Doc: Hello");
        assert!(seen[0].0.starts_with("Find the vendor.\n\nYou must respond with valid JSON"));
    }

    #[tokio::test]
    async fn provider_error_has_no_raw_response() {
        let failing = Arc::new(Canned {
            reply: Err("HTTP 401: bad key".into()),
            seen: Mutex::new(Vec::new()),
        });
        let outcome = extractor(failing).extract("x", "s", "{document}", &json!({})).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ProviderError));
        assert!(outcome.raw_response().is_none());
        assert_eq!(outcome.model(), "gpt-3.5-turbo");
    }

    struct Panicking;

    #[async_trait]
    impl TextGenerator for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn generate(&self, _request: &GenerationRequest<'_>) -> Result<String, DocError> {
            panic!("provider bug");
        }
    }

    #[tokio::test]
    async fn panicking_generator_becomes_internal_error() {
        let outcome = extractor(Arc::new(Panicking))
            .extract("x", "s", "{document}", &json!({}))
            .await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Internal));
        assert_eq!(outcome.error_message(), Some("LLM provider panicked"));
        assert!(outcome.raw_response().is_none());
    }

    #[test]
    fn preview_is_char_safe() {
        let s = "é".repeat(300);
        assert_eq!(preview(&s).chars().count(), 200);
        assert_eq!(preview("short"), "short");
    }
}
