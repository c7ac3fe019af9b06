//! Adapter over `edgequake_llm::LLMProvider`.
//!
//! Every backend ends up here: the OpenAI and Anthropic constructors in the
//! sibling modules, every provider the factory knows (Ollama, Gemini,
//! Azure, …), and a fully configured provider injected through
//! `LlmConfig::llm_provider`.

use super::{GenerationRequest, TextGenerator};
use crate::error::DocError;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct LlmProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    label: String,
    timeout: Option<Duration>,
}

impl LlmProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
            timeout: None,
        }
    }

    /// Bound each call to `secs` seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    pub fn provider(&self) -> &Arc<dyn LLMProvider> {
        &self.provider
    }

    /// Build a named provider via [`ProviderFactory::create_llm_provider`],
    /// which reads the provider's API key variable from the environment.
    pub fn from_factory(provider_name: &str, model: &str) -> Result<Self, DocError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            DocError::InvalidConfig(format!(
                "LLM provider '{provider_name}' is not configured: {e}"
            ))
        })?;
        Ok(Self::new(provider, provider_name))
    }
}

fn build_options(request: &GenerationRequest<'_>) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(request.temperature),
        max_tokens: Some(request.max_tokens),
        ..Default::default()
    }
}

#[async_trait]
impl TextGenerator for LlmProviderGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    /// The model is fixed when the provider is constructed; `request.model`
    /// is only logged.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, DocError> {
        info!("Calling {} (requested model: {})", self.label, request.model);
        let messages = vec![
            ChatMessage::system(request.system),
            ChatMessage::user(request.user),
        ];
        let options = build_options(request);

        let call = self.provider.chat(&messages, Some(&options));
        let response = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                DocError::provider(
                    &self.label,
                    format!("no response after {}s", limit.as_secs()),
                )
            })?,
            None => call.await,
        }
        .map_err(|e| DocError::provider(&self.label, e))?;
        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}
