//! Per-backup metadata file handling.
//!
//! Every backup directory carries a `metadata.json`; directories without one
//! are legacy backups.

use crate::utils::errors::{BackupError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

/// Fixed name of the metadata file inside a backup directory.
pub const METADATA_FILE: &str = "metadata.json";

/// On-disk metadata. Unknown, missing or `null` fields default to zero
/// values so files written by older or sparse writers stay readable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupMetadata {
    #[serde(deserialize_with = "null_as_default")]
    pub backup_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub creation_date: DateTime<Utc>,
    #[serde(deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub clickhouse_version: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tags: String,
    #[serde(deserialize_with = "null_as_default")]
    pub disks: BTreeMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub data_size: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub metadata_size: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub compressed_size: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub rbac_size: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub config_size: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub data_format: String,
    #[serde(deserialize_with = "null_as_default")]
    pub required_backup: String,
    #[serde(deserialize_with = "null_as_default")]
    pub tables: Vec<TableTitle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableTitle {
    pub database: String,
    pub table: String,
}

impl BackupMetadata {
    /// Parse a metadata document; `location` names it in the error.
    pub fn from_slice(bytes: &[u8], location: &str) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|source| BackupError::Corrupt {
            location: location.to_string(),
            source,
        })
    }
}

/// Result of looking for a metadata file.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    Found(BackupMetadata),
    /// No metadata file: the directory is a legacy backup.
    NotFound,
}

pub struct MetadataStore;

impl MetadataStore {
    /// Read `metadata.json` from `backup_dir`.
    ///
    /// A missing file is `Ok(LoadOutcome::NotFound)`. Any other read failure
    /// or malformed JSON is an error.
    pub fn load(backup_dir: &Path) -> Result<LoadOutcome> {
        let path = backup_dir.join(METADATA_FILE);
        let body = match fs::read(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LoadOutcome::NotFound),
            Err(source) => return Err(BackupError::MetadataRead { path, source }),
        };

        let mut metadata = BackupMetadata::from_slice(&body, &path.display().to_string())?;
        if metadata.backup_name.is_empty() {
            if let Some(name) = backup_dir.file_name() {
                metadata.backup_name = name.to_string_lossy().into_owned();
            }
        }
        Ok(LoadOutcome::Found(metadata))
    }

    /// Write `metadata` into `backup_dir`, replacing any existing file
    /// atomically.
    pub fn save(backup_dir: &Path, metadata: &BackupMetadata) -> Result<()> {
        let body = serde_json::to_vec_pretty(metadata)?;
        let mut tmp = tempfile::NamedTempFile::new_in(backup_dir)?;
        tmp.write_all(&body)?;
        tmp.as_file().sync_all()?;
        tmp.persist(backup_dir.join(METADATA_FILE))
            .map_err(|e| BackupError::Io(e.error))?;
        Ok(())
    }
}
