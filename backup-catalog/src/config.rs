//! Configuration for catalog listing and uploads.
//!
//! Loaded from a TOML file; every field has a default so a partial file (or
//! no file at all) is usable.

use crate::disks::Disk;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub clickhouse: ClickHouseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub s3: S3Config,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Remote destination kind (none, local, s3)
    #[serde(default = "default_remote_storage")]
    pub remote_storage: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickHouseConfig {
    /// Data path used when the database cannot be asked for its disks
    #[serde(default = "default_data_path")]
    pub default_path: PathBuf,

    /// Statically configured disks (name -> path)
    #[serde(default)]
    pub disks: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Key prefix every backup lives under
    #[serde(default)]
    pub path: String,

    /// Directory used as the bucket when remote_storage = "local"
    #[serde(default)]
    pub local_root: Option<PathBuf>,
}

/// S3 or S3-compatible bucket. Unset credentials fall back to the `AWS_*`
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    #[serde(default)]
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Custom endpoint for MinIO and other S3-compatible services
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Allow plain `http://` endpoints
    #[serde(default)]
    pub allow_http: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_remote_storage() -> String {
    "none".to_string()
}

fn default_data_path() -> PathBuf {
    PathBuf::from("/var/lib/clickhouse")
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            remote_storage: default_remote_storage(),
        }
    }
}

impl Default for ClickHouseConfig {
    fn default() -> Self {
        Self {
            default_path: default_data_path(),
            disks: BTreeMap::new(),
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: default_region(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            allow_http: false,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn remote_enabled(&self) -> bool {
        self.general.remote_storage != "none"
    }

    /// Disks declared in the file, in name order.
    pub fn static_disks(&self) -> Vec<Disk> {
        self.clickhouse
            .disks
            .iter()
            .map(|(name, path)| Disk::new(name.clone(), path.clone()))
            .collect()
    }
}
