use serde::{Deserialize, Serialize};
use std::time::Duration;
use tensorchat_core::{TensorchatError, TensorchatResult};

/// Production endpoint used when no `base_url` is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.tensorchat.io";

/// Settings for a [`TensorchatStreaming`](crate::TensorchatStreaming) client.
///
/// Deserializes from a TOML or JSON table; everything but `api_key` has a
/// default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorchatConfig {
    /// Sent as both the bearer token and the `x-api-key` header.
    pub api_key: String,
    /// Endpoint root; [`DEFAULT_BASE_URL`] when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Coalescing window for chunk callbacks. `0` delivers every chunk
    /// immediately.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Log dropped frames and session lifecycle.
    #[serde(default)]
    pub verbose: bool,
}

fn default_throttle_ms() -> u64 {
    50
}

impl TensorchatConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            throttle_ms: default_throttle_ms(),
            verbose: false,
        }
    }

    /// Builds a config from `TENSORCHAT_API_KEY` and, if set, `TENSORCHAT_BASE_URL`.
    pub fn from_env() -> TensorchatResult<Self> {
        let api_key = std::env::var("TENSORCHAT_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(TensorchatError::Config(
                "missing TENSORCHAT_API_KEY".into(),
            ));
        }
        let mut config = Self::new(api_key);
        if let Ok(url) = std::env::var("TENSORCHAT_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = Some(url);
            }
        }
        Ok(config)
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Overrides the endpoint root (for proxies or test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_throttle_ms(mut self, throttle_ms: u64) -> Self {
        self.throttle_ms = throttle_ms;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// `None` when coalescing is disabled.
    pub fn throttle(&self) -> Option<Duration> {
        (self.throttle_ms > 0).then(|| Duration::from_millis(self.throttle_ms))
    }

    pub(crate) fn stream_url(&self) -> String {
        format!("{}/streamProcess", self.base_url().trim_end_matches('/'))
    }

    /// Rejects a blank API key or a non-http(s) base URL.
    pub fn validate(&self) -> TensorchatResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(TensorchatError::Config("API key is required".into()));
        }
        let url = self.base_url();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(TensorchatError::Config(format!(
                "base_url must be an http(s) URL, got '{url}'"
            )));
        }
        Ok(())
    }
}
