//! Configuration types shared across crates.

use figment::Figment;
use figment::providers::{Env, Format, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix for environment variable overrides (e.g. `TEMPSTASH_CONTAINER_NAME`).
pub const ENV_PREFIX: &str = "TEMPSTASH_";

/// Default container holding temporary files.
pub const DEFAULT_CONTAINER_NAME: &str = "tempfiles";

/// Settings for the temporary file repository.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemporaryFileSettings {
    /// Container (bucket or directory) holding every temporary file.
    #[serde(default = "default_container_name")]
    pub container_name: String,
    /// Object store connection.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Expiry sweep tuning.
    #[serde(default)]
    pub sweep: SweepConfig,
}

fn default_container_name() -> String {
    DEFAULT_CONTAINER_NAME.to_string()
}

impl Default for TemporaryFileSettings {
    fn default() -> Self {
        Self {
            container_name: default_container_name(),
            storage: StorageConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl TemporaryFileSettings {
    /// Load settings from an optional TOML file, overridden by `TEMPSTASH_*`
    /// environment variables (nested keys separated by `__`).
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let mut figment = Figment::new();
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        let settings: Self = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| crate::Error::Config(format!("failed to load settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> crate::Result<()> {
        validate_container_name(&self.container_name).map_err(crate::Error::Config)?;
        self.storage.validate().map_err(crate::Error::Config)?;
        Ok(())
    }
}

/// Check that a container name is usable as a bucket name and a single
/// directory component.
pub fn validate_container_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("container name must not be empty".to_string());
    }
    if name.contains('/') || name.contains('\\') || name == "." || name.contains("..") {
        return Err(format!("container name {name:?} must be a single path component"));
    }
    Ok(())
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage. The container is a directory under `path`.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible storage. The container is the bucket.
    S3 {
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// Optional key prefix inside the bucket.
        prefix: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if not set.
        access_key_id: Option<String>,
        /// AWS secret access key.
        secret_access_key: Option<String>,
        /// Force path-style URLs (required for MinIO).
        #[serde(default)]
        force_path_style: bool,
    },
    /// Process-local storage, lost on drop.
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/tempfiles"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// Expiry sweep configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Keys requested per listing page.
    #[serde(default = "default_sweep_page_size")]
    pub page_size: usize,
    /// Maximum number of expired files deleted concurrently.
    #[serde(default = "default_delete_concurrency")]
    pub delete_concurrency: usize,
    /// Stop after this many listing pages (None = scan the whole container).
    #[serde(default)]
    pub max_pages: Option<usize>,
}

fn default_sweep_page_size() -> usize {
    1000
}

fn default_delete_concurrency() -> usize {
    16
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            page_size: default_sweep_page_size(),
            delete_concurrency: default_delete_concurrency(),
            max_pages: None,
        }
    }
}
