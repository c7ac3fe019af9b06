//! OpenAI adapter: `edgequake_llm::OpenAIProvider` behind [`LlmProviderGenerator`].

use super::LlmProviderGenerator;
use crate::config::LlmConfig;
use crate::error::DocError;
use edgequake_llm::OpenAIProvider;
use std::sync::Arc;
use tracing::info;

const PROVIDER: &str = "openai";

impl LlmProviderGenerator {
    /// OpenAI chat completions, or any OpenAI-compatible gateway when
    /// `config.base_url` is set.
    pub fn openai(config: &LlmConfig) -> Result<Self, DocError> {
        let api_key = config
            .resolved_api_key()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DocError::InvalidConfig(
                    "OpenAI API key not found. Set LLM_API_KEY or OPENAI_API_KEY.".into(),
                )
            })?;

        let provider = match config.base_url.as_deref() {
            Some(url) => {
                info!("Using OpenAI-compatible endpoint {url}");
                OpenAIProvider::compatible(api_key, url.trim_end_matches('/'))
            }
            None => OpenAIProvider::new(api_key),
        }
        .with_model(&config.model);

        Ok(Self::new(Arc::new(provider), PROVIDER).with_timeout_secs(config.request_timeout_secs))
    }
}
