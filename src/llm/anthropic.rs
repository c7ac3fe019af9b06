//! Anthropic adapter: `edgequake_llm::AnthropicProvider` behind [`LlmProviderGenerator`].

use super::LlmProviderGenerator;
use crate::config::LlmConfig;
use crate::error::DocError;
use edgequake_llm::AnthropicProvider;
use std::sync::Arc;

const PROVIDER: &str = "anthropic";

impl LlmProviderGenerator {
    /// Anthropic Messages API. `config.base_url` points it at a proxy or an
    /// Anthropic-compatible server.
    pub fn anthropic(config: &LlmConfig) -> Result<Self, DocError> {
        let api_key = config
            .resolved_api_key()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DocError::InvalidConfig(
                    "Anthropic API key not found. Set LLM_API_KEY or ANTHROPIC_API_KEY.".into(),
                )
            })?;

        let mut provider = AnthropicProvider::new(api_key).with_model(&config.model);
        if let Some(ref url) = config.base_url {
            provider = provider.with_base_url(url.trim_end_matches('/'));
        }

        Ok(Self::new(Arc::new(provider), PROVIDER).with_timeout_secs(config.request_timeout_secs))
    }
}
