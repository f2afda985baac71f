use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::extract::ExtractOptions;

/// Settings the [`crate::generate::Generator`] runs with.
///
/// Every section is optional when deserialized; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Directory rendered pages are written to and served from.
    pub output_dir: PathBuf,
    pub cache: CacheConfig,
    pub extraction: ExtractOptions,
    pub synthesis: SynthesisConfig,
    /// Files parsed concurrently.
    pub extract_concurrency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub db_path: PathBuf,
    pub ttl_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Synthesis calls in flight at once.
    pub concurrency: usize,
    /// Per-call limit; `None` waits as long as the backend does.
    pub timeout_secs: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("sample_output"),
            cache: CacheConfig::default(),
            extraction: ExtractOptions::default(),
            synthesis: SynthesisConfig::default(),
            extract_concurrency: 8,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("cache.db"),
            ttl_days: 7,
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.ttl_days))
    }
}

impl SynthesisConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl GeneratorConfig {
    pub fn trace_loaded(&self) {
        info!(
            output_dir = %self.output_dir.display(),
            cache_db = %self.cache.db_path.display(),
            ttl_days = self.cache.ttl_days,
            flatten_nested_functions = self.extraction.flatten_nested_functions,
            synthesis_concurrency = self.synthesis.concurrency,
            "Loaded GeneratorConfig"
        );
        debug!(?self, "GeneratorConfig loaded (full debug)");
    }
}
