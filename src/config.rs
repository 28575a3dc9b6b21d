//! Provider configuration.

use std::time::Duration;

use crate::error::{Error, Result};

/// Sliding-window rate limit applied per transport.
#[derive(Debug, Clone)]
pub struct RateLimit {
    /// Requests allowed inside one window.
    pub max_requests: usize,
    pub window: Duration,
    /// How long a request may wait for a permit before timing out.
    pub permit_timeout: Duration,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
            permit_timeout: Duration::from_secs(30),
        }
    }
}

/// Connection settings for an OpenAI-compatible provider.
///
/// `base_url` and `model` are required; everything else has workable
/// defaults. Local servers typically ignore the API key, so a placeholder
/// is supplied when none is configured.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_keys: Vec<String>,
    pub timeout: Duration,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub rate_limit: Option<RateLimit>,
}

impl ProviderConfig {
    pub fn builder() -> ProviderConfigBuilder {
        ProviderConfigBuilder::default()
    }

    /// Reads `LLMFN_BASE_URL`, `LLMFN_MODEL`, and optionally `LLMFN_API_KEY`
    /// (comma-separated for multiple keys).
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        match std::env::var("LLMFN_BASE_URL") {
            Ok(url) => builder = builder.base_url(url),
            Err(_) => return Err(Error::config("LLMFN_BASE_URL is not set")),
        }
        match std::env::var("LLMFN_MODEL") {
            Ok(model) => builder = builder.model(model),
            Err(_) => return Err(Error::config("LLMFN_MODEL is not set")),
        }
        if let Ok(keys) = std::env::var("LLMFN_API_KEY") {
            for key in keys.split(',').map(str::trim).filter(|k| !k.is_empty()) {
                builder = builder.api_key(key);
            }
        }
        builder.build()
    }
}

#[derive(Debug, Default)]
pub struct ProviderConfigBuilder {
    base_url: Option<String>,
    model: Option<String>,
    api_keys: Vec<String>,
    timeout: Option<Duration>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    rate_limit: Option<RateLimit>,
}

impl ProviderConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Adds one API key; call repeatedly to build a pool.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_keys.push(key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    pub fn build(self) -> Result<ProviderConfig> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::config("base_url is required"))?;
        let model = self
            .model
            .ok_or_else(|| Error::config("model is required"))?;
        if base_url.trim().is_empty() {
            return Err(Error::config("base_url must not be empty"));
        }
        if model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }
        let api_keys = if self.api_keys.is_empty() {
            vec!["not-needed".to_string()]
        } else {
            self.api_keys
        };
        Ok(ProviderConfig {
            base_url,
            model,
            api_keys,
            timeout: self.timeout.unwrap_or(Duration::from_secs(60)),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            rate_limit: self.rate_limit,
        })
    }
}
