//! Local backup catalog: directories under `<data path>/backup`.

use super::metadata::{LoadOutcome, MetadataStore};
use super::{sort_catalog, BackupRecord, Location};
use crate::disks::{default_data_path, resolve_disks, Disk, DiskSource};
use crate::utils::errors::{BackupError, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Name of the directory, below the data path, that holds backups.
pub const BACKUP_DIR: &str = "backup";

/// Something the scan skipped or degraded on without failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanWarning {
    /// Disk resolution was unavailable; the fallback default disk was used.
    DiskFallback { reason: String },
    /// An entry under the backup directory could not be stat'ed.
    Unreadable { name: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct LocalCatalog {
    /// Backups ordered by creation time, oldest first.
    pub backups: Vec<BackupRecord>,
    pub disks: Vec<Disk>,
    pub warnings: Vec<ScanWarning>,
}

impl LocalCatalog {
    pub fn find(&self, name: &str) -> Result<&BackupRecord> {
        if name.is_empty() {
            return Err(BackupError::NameRequired);
        }
        self.backups
            .iter()
            .find(|b| b.name == name)
            .ok_or_else(|| BackupError::BackupNotFound(name.to_string()))
    }
}

pub struct LocalCatalogScanner<'a> {
    source: Option<&'a dyn DiskSource>,
    fallback_path: PathBuf,
}

impl<'a> LocalCatalogScanner<'a> {
    pub fn new(source: Option<&'a dyn DiskSource>, fallback_path: impl Into<PathBuf>) -> Self {
        Self {
            source,
            fallback_path: fallback_path.into(),
        }
    }

    /// Scan the local backup directory.
    ///
    /// `disks` skips disk resolution when the caller already has them.
    pub async fn scan(
        &self,
        disks: Option<Vec<Disk>>,
        cancel: &CancellationToken,
    ) -> Result<LocalCatalog> {
        let mut warnings = Vec::new();
        let disks = match disks {
            Some(disks) => disks,
            None => {
                let resolved = resolve_disks(self.source, &self.fallback_path).await?;
                if let Some(reason) = resolved.degraded {
                    warnings.push(ScanWarning::DiskFallback { reason });
                }
                resolved.disks
            }
        };

        let backups_path = default_data_path(&disks)?.join(BACKUP_DIR);
        let cancel = cancel.clone();
        let (backups, scan_warnings) =
            tokio::task::spawn_blocking(move || scan_backup_dir(&backups_path, &cancel))
                .await
                .map_err(|e| BackupError::Io(std::io::Error::other(e)))??;
        warnings.extend(scan_warnings);

        Ok(LocalCatalog {
            backups,
            disks,
            warnings,
        })
    }
}

/// Read every backup directory directly under `backups_path`.
///
/// A missing `backups_path` is an empty catalog. Entries that cannot be
/// stat'ed are reported as warnings and skipped; metadata errors abort.
pub fn scan_backup_dir(
    backups_path: &Path,
    cancel: &CancellationToken,
) -> Result<(Vec<BackupRecord>, Vec<ScanWarning>)> {
    let entries = match fs::read_dir(backups_path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok((Vec::new(), Vec::new())),
        Err(e) => return Err(e.into()),
    };

    let mut backups = Vec::new();
    let mut warnings = Vec::new();

    for entry in entries {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled {
                completed: backups.len(),
            });
        }

        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();

        let info = match fs::metadata(&path) {
            Ok(info) => info,
            Err(e) => {
                warnings.push(ScanWarning::Unreadable {
                    name,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        if !info.is_dir() {
            continue;
        }

        match MetadataStore::load(&path)? {
            LoadOutcome::Found(metadata) => {
                backups.push(BackupRecord::from_metadata(metadata, Location::Local));
            }
            LoadOutcome::NotFound => {
                let created_at = match info.modified() {
                    Ok(modified) => DateTime::<Utc>::from(modified),
                    Err(e) => {
                        warnings.push(ScanWarning::Unreadable {
                            name,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };
                backups.push(BackupRecord::legacy(name, Location::Local, created_at));
            }
        }
    }

    sort_catalog(&mut backups);
    Ok((backups, warnings))
}
