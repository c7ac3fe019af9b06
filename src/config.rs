//! Configuration types for the conversion engine and the LLM backend.
//!
//! Both halves of the library are configured through a plain struct plus a
//! builder that validates on `build()`, so a config can be cloned across
//! tasks, logged with `{:?}` (secrets redacted) and diffed between runs.

use crate::error::DocError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Default wall-clock bound for one external converter run.
pub const DEFAULT_CONVERTER_TIMEOUT_SECS: u64 = 60;

/// Subdirectory of the storage root that receives converted files.
pub const CONVERSIONS_DIR: &str = "conversions";

// ── Engine ───────────────────────────────────────────────────────────────

/// Configuration for [`crate::DocumentEngine`].
///
/// # Example
/// ```rust
/// use edgequake_doc2json::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .storage_root("/var/lib/doc2json")
///     .converter_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.converter_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Durable storage root. Converted files land in `<root>/conversions/`
    /// and per-call scratch directories are created (and removed) under it.
    pub storage_root: PathBuf,

    /// Executable of the external document converter. Default: `libreoffice`.
    ///
    /// Overridable with `DOC2JSON_CONVERTER`. Any binary accepting
    /// `--headless --convert-to <fmt> --outdir <dir> <input>` works (`soffice`
    /// on most Linux distributions).
    pub converter_program: String,

    /// Hard timeout for a single converter run, in seconds. Default: 60.
    pub converter_timeout_secs: u64,

    /// Pass `<ext>:<filter>` to `--convert-to` instead of the bare extension.
    /// Default: false.
    pub explicit_filters: bool,

    /// Directory or file of a pdfium shared library. When `None`, the
    /// `PDFIUM_LIB_PATH` environment variable and then the system library
    /// are probed.
    pub pdfium_lib_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("./storage"),
            converter_program: std::env::var("DOC2JSON_CONVERTER")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "libreoffice".to_string()),
            converter_timeout_secs: DEFAULT_CONVERTER_TIMEOUT_SECS,
            explicit_filters: false,
            pdfium_lib_path: None,
        }
    }
}

impl EngineConfig {
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            config: Self::default(),
        }
    }

    /// `<storage_root>/conversions`
    pub fn conversions_dir(&self) -> PathBuf {
        self.storage_root.join(CONVERSIONS_DIR)
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = root.into();
        self
    }

    pub fn converter_program(mut self, program: impl Into<String>) -> Self {
        self.config.converter_program = program.into();
        self
    }

    pub fn converter_timeout_secs(mut self, secs: u64) -> Self {
        self.config.converter_timeout_secs = secs;
        self
    }

    pub fn explicit_filters(mut self, v: bool) -> Self {
        self.config.explicit_filters = v;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<EngineConfig, DocError> {
        let c = &self.config;
        if c.converter_program.trim().is_empty() {
            return Err(DocError::InvalidConfig(
                "Converter program must not be empty".into(),
            ));
        }
        if c.converter_timeout_secs == 0 {
            return Err(DocError::InvalidConfig(
                "Converter timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── LLM ──────────────────────────────────────────────────────────────────

/// Which backend adapter [`crate::llm::build_generator`] instantiates.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProviderKind {
    /// OpenAI-shaped chat completions API. (default)
    #[default]
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
    /// Any other provider name understood by `edgequake_llm::ProviderFactory`
    /// (e.g. `ollama`, `gemini`, `azure`).
    Other(String),
}

impl ProviderKind {
    pub fn name(&self) -> &str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Other(name) => name,
        }
    }
}

impl FromStr for ProviderKind {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" => Err(DocError::InvalidConfig("Provider name is empty".into())),
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(ProviderKind::Anthropic),
            other => Ok(ProviderKind::Other(other.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for the LLM backend used by [`crate::StructuredExtractor`].
#[derive(Clone)]
pub struct LlmConfig {
    /// Backend adapter to use. Default: OpenAI.
    pub provider: ProviderKind,

    /// Model identifier sent with every request. Default: `gpt-3.5-turbo`.
    pub model: String,

    /// API key. When `None`, adapters fall back to `OPENAI_API_KEY` /
    /// `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,

    /// Override of the provider's API base URL (proxies, gateways, tests).
    pub base_url: Option<String>,

    /// Sampling temperature. Default: 0.1.
    ///
    /// Extraction wants the model to copy values out of the document, not to
    /// improvise, so the default stays close to zero.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4000.
    pub max_tokens: usize,

    /// Upper bound on one provider call in seconds. Default: 120.
    pub request_timeout_secs: u64,

    /// Pre-constructed edgequake-llm provider. Takes precedence over
    /// `provider` when set.
    pub llm_provider: Option<Arc<dyn edgequake_llm::LLMProvider>>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: "gpt-3.5-turbo".to_string(),
            api_key: None,
            base_url: None,
            temperature: 0.1,
            max_tokens: 4000,
            request_timeout_secs: 120,
            llm_provider: None,
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field(
                "llm_provider",
                &self.llm_provider.as_ref().map(|_| "<dyn LLMProvider>"),
            )
            .finish()
    }
}

impl LlmConfig {
    pub fn builder() -> LlmConfigBuilder {
        LlmConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the configuration from the environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `LLM_PROVIDER` | `openai` |
    /// | `LLM_MODEL` | `gpt-3.5-turbo` |
    /// | `LLM_API_KEY` | provider-specific key variable |
    /// | `LLM_BASE_URL` | provider default |
    /// | `LLM_TEMPERATURE` | `0.1` |
    /// | `LLM_MAX_TOKENS` | `4000` |
    pub fn from_env() -> Result<Self, DocError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LlmConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DocError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut builder = Self::builder();

        if let Some(provider) = get("LLM_PROVIDER") {
            builder = builder.provider(provider.parse::<ProviderKind>()?);
        }
        if let Some(model) = get("LLM_MODEL") {
            builder = builder.model(model);
        }
        if let Some(key) = get("LLM_API_KEY") {
            builder = builder.api_key(key);
        }
        if let Some(url) = get("LLM_BASE_URL") {
            builder = builder.base_url(url);
        }
        if let Some(t) = get("LLM_TEMPERATURE") {
            let t: f32 = t.trim().parse().map_err(|_| {
                DocError::InvalidConfig(format!("LLM_TEMPERATURE is not a number: {t}"))
            })?;
            builder = builder.temperature(t);
        }
        if let Some(n) = get("LLM_MAX_TOKENS") {
            let n: usize = n.trim().parse().map_err(|_| {
                DocError::InvalidConfig(format!("LLM_MAX_TOKENS is not an integer: {n}"))
            })?;
            builder = builder.max_tokens(n);
        }
        builder.build()
    }

    /// The API key to use, falling back to the provider's conventional
    /// environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }
        let var = match self.provider {
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Other(_) => return None,
        };
        std::env::var(var).ok().filter(|k| !k.is_empty())
    }

    /// Settings that are set but cannot reach the selected backend.
    ///
    /// Factory providers and pre-built providers read their own key and
    /// endpoint, so `api_key` and `base_url` only apply to `openai` and
    /// `anthropic`.
    pub fn ignored_settings(&self) -> Vec<&'static str> {
        let uses_own_credentials =
            self.llm_provider.is_some() || matches!(self.provider, ProviderKind::Other(_));
        if !uses_own_credentials {
            return Vec::new();
        }
        let mut ignored = Vec::new();
        if self.api_key.is_some() {
            ignored.push("api_key");
        }
        if self.base_url.is_some() {
            ignored.push("base_url");
        }
        ignored
    }
}

/// Builder for [`LlmConfig`].
#[derive(Debug)]
pub struct LlmConfigBuilder {
    config: LlmConfig,
}

impl LlmConfigBuilder {
    pub fn provider(mut self, provider: ProviderKind) -> Self {
        self.config.provider = provider;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn llm_provider(mut self, provider: Arc<dyn edgequake_llm::LLMProvider>) -> Self {
        self.config.llm_provider = Some(provider);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<LlmConfig, DocError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(DocError::InvalidConfig("Model must not be empty".into()));
        }
        if c.max_tokens == 0 {
            return Err(DocError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.request_timeout_secs == 0 {
            return Err(DocError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
