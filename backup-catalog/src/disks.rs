//! Storage disk resolution.
//!
//! The database knows which disks exist and where they are mounted. When it
//! cannot be reached, local listing still works against a single `default`
//! disk at a conventional path.

use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_DISK: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub name: String,
    pub path: PathBuf,
}

impl Disk {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// Source of disk definitions, usually the database connection.
///
/// Implementations report an unreachable database as
/// [`BackupError::TransportUnavailable`]; that is the only error the
/// resolver recovers from.
#[async_trait]
pub trait DiskSource: Send + Sync {
    async fn list_disks(&self) -> Result<Vec<Disk>>;
}

/// Disks taken verbatim from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticDisks {
    disks: Vec<Disk>,
}

impl StaticDisks {
    pub fn new(disks: Vec<Disk>) -> Self {
        Self { disks }
    }
}

#[async_trait]
impl DiskSource for StaticDisks {
    async fn list_disks(&self) -> Result<Vec<Disk>> {
        if self.disks.is_empty() {
            return Err(BackupError::TransportUnavailable(
                "no disks configured".to_string(),
            ));
        }
        Ok(self.disks.clone())
    }
}

/// Outcome of disk resolution.
#[derive(Debug, Clone)]
pub struct ResolvedDisks {
    pub disks: Vec<Disk>,
    /// Set when the source was unavailable and the fallback disk is in use.
    pub degraded: Option<String>,
}

/// Ask `source` for disks, falling back to a single default disk at
/// `fallback_path` when there is no source or it is unreachable.
pub async fn resolve_disks(
    source: Option<&dyn DiskSource>,
    fallback_path: &Path,
) -> Result<ResolvedDisks> {
    let reason = match source {
        None => "no disk source".to_string(),
        Some(source) => match source.list_disks().await {
            Ok(disks) => {
                return Ok(ResolvedDisks {
                    disks,
                    degraded: None,
                })
            }
            Err(BackupError::TransportUnavailable(reason)) => reason,
            Err(e) => return Err(e),
        },
    };

    Ok(ResolvedDisks {
        disks: vec![Disk::new(DEFAULT_DISK, fallback_path)],
        degraded: Some(reason),
    })
}

/// Path of the disk named `default`.
pub fn default_data_path(disks: &[Disk]) -> Result<PathBuf> {
    disks
        .iter()
        .find(|d| d.name == DEFAULT_DISK)
        .map(|d| d.path.clone())
        .ok_or(BackupError::NoDefaultDisk)
}
