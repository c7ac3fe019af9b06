//! Provider adapters behind one narrow interface.
//!
//! Extraction only ever needs "system text + user text in, generated text
//! out". [`TextGenerator`] is that interface. Every backend is an
//! `edgequake_llm::LLMProvider` wrapped in [`LlmProviderGenerator`]:
//!
//! | Constructor | Provider | Key / endpoint |
//! |-------------|----------|----------------|
//! | [`LlmProviderGenerator::openai`] | `OpenAIProvider` (or an OpenAI-compatible gateway) | `LLM_API_KEY` / `OPENAI_API_KEY`, `LLM_BASE_URL` |
//! | [`LlmProviderGenerator::anthropic`] | `AnthropicProvider` | `LLM_API_KEY` / `ANTHROPIC_API_KEY`, `LLM_BASE_URL` |
//! | [`LlmProviderGenerator::from_factory`] | anything else via `ProviderFactory` | the provider's own variables |
//! | [`LlmProviderGenerator::new`] | a pre-built provider | caller's choice |
//!
//! The adapter is chosen once, when the extractor is built
//! ([`build_generator`]); the extraction hot path only sees the trait object.

pub mod anthropic;
pub mod bridge;
pub mod openai;

pub use bridge::LlmProviderGenerator;

use crate::config::{LlmConfig, ProviderKind};
use crate::error::DocError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// One generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub model: &'a str,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// "Accept system + user text, return generated text."
///
/// Implementations return the model's text verbatim; fence stripping and
/// JSON parsing happen in the caller.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short provider label used in logs and error messages.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, DocError>;
}

/// Instantiate the adapter selected by `config`.
///
/// A pre-built `llm_provider` wins over `provider`.
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn TextGenerator>, DocError> {
    for setting in config.ignored_settings() {
        warn!("'{setting}' has no effect for this LLM provider and is ignored");
    }

    let generator = if let Some(ref provider) = config.llm_provider {
        info!("Using pre-built LLM provider");
        LlmProviderGenerator::new(Arc::clone(provider), "llm-provider")
    } else {
        info!("Using LLM provider '{}' (model {})", config.provider, config.model);
        match config.provider {
            ProviderKind::OpenAi => LlmProviderGenerator::openai(config)?,
            ProviderKind::Anthropic => LlmProviderGenerator::anthropic(config)?,
            ProviderKind::Other(ref name) => {
                LlmProviderGenerator::from_factory(name, &config.model)?
            }
        }
    };
    Ok(Arc::new(
        generator.with_timeout_secs(config.request_timeout_secs),
    ))
}
