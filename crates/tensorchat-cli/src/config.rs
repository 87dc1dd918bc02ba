use serde::Deserialize;
use std::path::Path;
use tensorchat_stream::TensorchatConfig;
use tracing::{debug, info};

pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash-lite";
pub const DEFAULT_CONTEXT: &str = "You are a helpful assistant.";

/// Contents of `tensorchat.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    /// `[client]` table. When absent the client is configured from the
    /// environment.
    #[serde(default)]
    pub client: Option<TensorchatConfig>,
    #[serde(default)]
    pub request: RequestDefaults,
}

/// `[request]` table: defaults for flags not given on the command line.
#[derive(Debug, Deserialize)]
pub struct RequestDefaults {
    #[serde(default = "default_context")]
    pub context: String,
    #[serde(default = "default_model")]
    pub model: String,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            context: default_context(),
            model: default_model(),
        }
    }
}

fn default_context() -> String {
    DEFAULT_CONTEXT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Reads the config file. A missing file yields the defaults.
pub async fn load(path: &Path) -> anyhow::Result<CliConfig> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(CliConfig::default());
        }
        Err(e) => {
            return Err(anyhow::anyhow!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        }
    };
    let config: CliConfig = toml::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("Invalid config file '{}': {}", path.display(), e))?;
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Command-line overrides applied on top of the file or environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientOverrides {
    pub throttle_ms: Option<u64>,
    pub verbose: bool,
}

/// Picks the `[client]` table if present, else `TENSORCHAT_API_KEY` /
/// `TENSORCHAT_BASE_URL`, then applies `overrides`.
pub fn resolve_client(
    file: Option<TensorchatConfig>,
    overrides: ClientOverrides,
) -> anyhow::Result<TensorchatConfig> {
    let mut config = match file {
        Some(config) => config,
        None => TensorchatConfig::from_env()?,
    };
    if let Some(throttle_ms) = overrides.throttle_ms {
        config.throttle_ms = throttle_ms;
    }
    config.verbose |= overrides.verbose;
    config.validate()?;
    Ok(config)
}
