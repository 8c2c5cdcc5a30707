//! Configuration for the model gateway.
//!
//! All gateway behaviour is controlled through [`GatewayConfig`], built via
//! its [`GatewayConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share a config between the upload and generation calls and to
//! diff two runs to understand why their outputs differ.

use crate::error::DocMindError;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when no API key is set explicitly.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default model used for both classification and extraction calls.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default base URL of the hosted model service.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Configuration for a [`crate::gateway::GeminiGateway`].
///
/// Built via [`GatewayConfig::builder()`] or [`GatewayConfig::default()`].
///
/// # Example
/// ```rust
/// use docmind::GatewayConfig;
///
/// let config = GatewayConfig::builder()
///     .model("gemini-2.5-flash")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// API key for the model service. If `None`, read from `GEMINI_API_KEY`
    /// at gateway construction time. Never serialised.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,

    /// Model identifier used for generation calls. Default: `gemini-2.5-flash`.
    pub model: String,

    /// Base URL of the service. Default: the hosted Gemini endpoint.
    /// Point this at a local emulator in tests.
    pub base_url: String,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Classification and field extraction are transcription-like tasks; any
    /// sampling creativity only degrades answer fidelity.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 8192.
    ///
    /// Dense documents (long invoices, multi-page tables) can produce large
    /// extraction replies. Setting this too low truncates the JSON
    /// mid-structure, which then surfaces as an `InvalidReply`.
    pub max_output_tokens: usize,

    /// Upload timeout in seconds. Default: 120.
    pub upload_timeout_secs: u64,

    /// Per-generation-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            temperature: 0.0,
            max_output_tokens: 8192,
            upload_timeout_secs: 120,
            api_timeout_secs: 60,
        }
    }
}

impl GatewayConfig {
    /// Create a new builder for `GatewayConfig`.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve the API key: explicit config value first, then environment.
    pub fn resolve_api_key(&self) -> Result<String, DocMindError> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(DocMindError::ApiKeyMissing),
        }
    }
}

/// Builder for [`GatewayConfig`].
#[derive(Debug)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
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

    pub fn max_output_tokens(mut self, n: usize) -> Self {
        self.config.max_output_tokens = n;
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs.max(1);
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GatewayConfig, DocMindError> {
        let c = &self.config;
        if c.model.is_empty() {
            return Err(DocMindError::InvalidConfig("Model must not be empty".into()));
        }
        if c.base_url.is_empty() {
            return Err(DocMindError::InvalidConfig(
                "Base URL must not be empty".into(),
            ));
        }
        if c.max_output_tokens == 0 {
            return Err(DocMindError::InvalidConfig(
                "max_output_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_hosted_service() {
        let c = GatewayConfig::default();
        assert_eq!(c.model, DEFAULT_MODEL);
        assert!(c.base_url.starts_with("https://"));
        assert_eq!(c.temperature, 0.0);
    }

    #[test]
    fn builder_clamps_temperature() {
        let c = GatewayConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_rejects_empty_model() {
        let err = GatewayConfig::builder().model("").build().unwrap_err();
        assert!(matches!(err, DocMindError::InvalidConfig(_)));
    }

    #[test]
    fn explicit_api_key_wins_over_env() {
        let c = GatewayConfig::builder().api_key("sk-test").build().unwrap();
        assert_eq!(c.resolve_api_key().unwrap(), "sk-test");
    }
}
