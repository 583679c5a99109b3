//! Configuration types for an OCR session.
//!
//! Everything the session needs from its environment lives in
//! [`SessionConfig`], built via [`SessionConfigBuilder`]. The config is built
//! once at startup, wrapped in an `Arc`, and never mutated afterwards; each
//! upload reads the same values.

use crate::error::Ocr2MdError;
use std::fmt;

/// Model used when the caller does not choose one.
pub const DEFAULT_MODEL: &str = "llama-3.2-90b-vision-preview";

/// The models offered to the user. Exactly one today.
pub const SUPPORTED_MODELS: &[&str] = &[DEFAULT_MODEL];

/// Groq's OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Environment variable overriding [`DEFAULT_BASE_URL`].
pub const BASE_URL_ENV: &str = "GROQ_BASE_URL";

/// Returns `true` when `model` is in [`SUPPORTED_MODELS`].
pub fn is_supported_model(model: &str) -> bool {
    SUPPORTED_MODELS.contains(&model)
}

/// Check `model` against the catalog.
pub fn validate_model(model: &str) -> Result<(), Ocr2MdError> {
    if is_supported_model(model) {
        Ok(())
    } else {
        Err(Ocr2MdError::UnknownModel {
            model: model.to_string(),
            available: SUPPORTED_MODELS.join(", "),
        })
    }
}

/// Immutable configuration shared by every upload in a session.
///
/// # Example
/// ```rust
/// use ocr2md::SessionConfig;
///
/// let config = SessionConfig::builder()
///     .api_key("gsk_test")
///     .dpi(150)
///     .max_tokens(2048)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 150);
/// ```
#[derive(Clone)]
pub struct SessionConfig {
    /// Vision model identifier. Must be one of [`SUPPORTED_MODELS`].
    pub model: String,

    /// Bearer credential for the hosted model.
    pub api_key: Option<String>,

    /// API root; `/chat/completions` is appended. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Sampling temperature. Range 0.0–2.0. Default: 0.7.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 1024.
    pub max_tokens: u32,

    /// Resolution passed to `pdftoppm -r`. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Per-request timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom instruction text. If None, uses [`crate::prompts::DEFAULT_SYSTEM_PROMPT`].
    pub system_prompt: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            dpi: 200,
            api_timeout_secs: 60,
            system_prompt: None,
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("dpi", &self.dpi)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl SessionConfig {
    /// Create a new builder for `SessionConfig`.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Builder pre-filled from `GROQ_API_KEY` and `GROQ_BASE_URL`.
    pub fn from_env() -> SessionConfigBuilder {
        let mut builder = Self::builder();
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.is_empty() {
                builder = builder.api_key(key);
            }
        }
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.is_empty() {
                builder = builder.base_url(url);
            }
        }
        builder
    }

    /// Full URL of the chat-completions endpoint.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Builder for [`SessionConfig`].
#[derive(Debug)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SessionConfig, Ocr2MdError> {
        let c = &self.config;
        validate_model(&c.model)?;
        if c.max_tokens == 0 {
            return Err(Ocr2MdError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Ocr2MdError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(Ocr2MdError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        Ok(self.config)
    }
}
