use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OffsiteError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffsiteConfig {
    pub source: SourceConfig,
    #[serde(default)]
    pub index: IndexConfig,
    pub remote: RemoteConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root directory to mirror; all regular files beneath it are candidates.
    pub path: String,
    /// Gitignore-style patterns excluded from the walk.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Path to the SQLite ledger (created on first run).
    #[serde(default = "default_index_path")]
    pub path: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Remote URL: `s3://bucket[/prefix]`, `file://path`, or a bare path.
    pub url: String,
    /// S3 region (default: us-east-1).
    pub region: Option<String>,
    /// S3 access key ID.
    pub access_key_id: Option<String>,
    /// S3 secret access key.
    pub secret_access_key: Option<String>,
    /// S3 endpoint override (for S3-compatible stores).
    pub endpoint: Option<String>,
    /// Deadline for a single object write, in seconds.
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
    /// Retry settings for remote existence checks.
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

fn default_index_path() -> String {
    "offsite.db".to_string()
}

fn default_upload_timeout_secs() -> u64 {
    50
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

/// Resolve the config file path: explicit flag, then `$OFFSITE_CONFIG`,
/// then `./offsite.yaml`.
pub fn resolve_config_path(flag: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = flag {
        return Some(PathBuf::from(path));
    }
    if let Ok(path) = std::env::var("OFFSITE_CONFIG") {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    let local = PathBuf::from("offsite.yaml");
    if local.exists() {
        return Some(local);
    }
    None
}

/// Load and validate a configuration file.
pub fn load(path: &Path) -> Result<OffsiteConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        OffsiteError::Config(format!("cannot read config '{}': {e}", path.display()))
    })?;
    let config: OffsiteConfig = serde_yaml::from_str(&raw)
        .map_err(|e| OffsiteError::Config(format!("invalid config '{}': {e}", path.display())))?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &OffsiteConfig) -> Result<()> {
    if config.source.path.is_empty() {
        return Err(OffsiteError::Config("source.path must not be empty".into()));
    }
    if config.remote.url.is_empty() {
        return Err(OffsiteError::Config("remote.url must not be empty".into()));
    }
    if config.remote.upload_timeout_secs == 0 {
        return Err(OffsiteError::Config(
            "remote.upload_timeout_secs must be positive".into(),
        ));
    }
    Ok(())
}
