/// `load_config` module: loads the static YAML config and layers environment overrides on top.
///
/// This module is the only place where untrusted YAML is parsed into the typed
/// configuration the CLI and server run with.
///
/// # Responsibilities
/// - Parse the optional YAML file into [`CliConfig`]; every section may be omitted
/// - Apply environment overrides (`HOST`, `PORT`, `OUTPUT_DIR`, `CACHE_DB_PATH`,
///   `CACHE_DURATION_DAYS`) after the file, so deployments can tune a shared config
/// - Inject the `OPENAI_API_KEY` secret, which is never read from YAML
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, Result};
use conductdoc_core::config::GeneratorConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub server: ServerSection,
    pub generator: GeneratorConfig,
    pub openai: OpenAiSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSection {
    pub base_url: String,
    pub model: String,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
    /// Only ever populated from `OPENAI_API_KEY`.
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4".to_string(),
            request_timeout_secs: 120,
            api_key: None,
        }
    }
}

/// Loads a static YAML config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow!("Failed to read config file {:?}: {}", path_ref, e));
        }
    };

    let raw: CliConfig = if config_content.trim().is_empty() {
        CliConfig::default()
    } else {
        match serde_yaml::from_str(&config_content) {
            Ok(conf) => {
                info!(config_path = ?path_ref, "Parsed config YAML successfully");
                conf
            }
            Err(e) => {
                error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
                return Err(anyhow!("Failed to parse config YAML: {e}"));
            }
        }
    };

    apply_env_overrides(raw, |key| std::env::var(key).ok())
}

/// Defaults plus environment, or the file at `path` plus environment.
pub fn load_config_or_default(path: Option<&Path>) -> Result<CliConfig> {
    match path {
        Some(path) => load_config(path),
        None => {
            info!("No config file given, using defaults and environment");
            apply_env_overrides(CliConfig::default(), |key| std::env::var(key).ok())
        }
    }
}

/// Applies overrides looked up through `lookup`. Empty values are ignored.
pub fn apply_env_overrides<F>(mut config: CliConfig, lookup: F) -> Result<CliConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(host) = get("HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("PORT") {
        config.server.port = port
            .parse()
            .map_err(|e| anyhow!("PORT must be a port number, got {port:?}: {e}"))?;
    }
    if let Some(dir) = get("OUTPUT_DIR") {
        config.generator.output_dir = PathBuf::from(dir);
    }
    if let Some(db_path) = get("CACHE_DB_PATH") {
        config.generator.cache.db_path = PathBuf::from(db_path);
    }
    if let Some(days) = get("CACHE_DURATION_DAYS") {
        config.generator.cache.ttl_days = days
            .parse()
            .map_err(|e| anyhow!("CACHE_DURATION_DAYS must be a whole number, got {days:?}: {e}"))?;
    }
    if config.generator.cache.ttl_days == 0 {
        warn!("Cache TTL of 0 days means nothing will be cached");
    }

    config.openai.api_key = get("OPENAI_API_KEY");
    if config.openai.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; documentation synthesis will fail per unit");
    }
    Ok(config)
}
