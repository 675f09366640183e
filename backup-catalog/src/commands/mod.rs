//! CLI-facing operations. These wire configuration into the catalog and
//! transfer components and are the only place that logs.

pub mod list;
pub mod upload;

use crate::catalog::{BackupDestination, LocalCatalog, LocalCatalogScanner, ScanWarning};
use crate::config::Config;
use crate::disks::{DiskSource, StaticDisks};
use crate::storage::{CloudObjectStore, LocalObjectStore, ObjectStore};
use crate::utils::errors::{BackupError, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Build the remote destination described by `config`, `None` when
/// `remote_storage = "none"`.
pub fn destination_from_config(config: &Config) -> Result<Option<BackupDestination>> {
    let store: Arc<dyn ObjectStore> = match config.general.remote_storage.as_str() {
        "none" => return Ok(None),
        "local" => {
            let root = config.storage.local_root.as_ref().ok_or_else(|| {
                BackupError::Config("storage.local_root is required for remote_storage = \"local\"".into())
            })?;
            Arc::new(LocalObjectStore::new(root))
        }
        "s3" => Arc::new(CloudObjectStore::s3(&config.s3)?),
        other => {
            return Err(BackupError::Config(format!(
                "unsupported remote_storage '{other}'"
            )))
        }
    };
    Ok(Some(BackupDestination::new(store, &config.storage.path)))
}

/// Scan local backups, logging anything the scan skipped.
pub async fn scan_local(config: &Config, cancel: &CancellationToken) -> Result<LocalCatalog> {
    let static_disks = StaticDisks::new(config.static_disks());
    let source: Option<&dyn DiskSource> = if config.clickhouse.disks.is_empty() {
        None
    } else {
        Some(&static_disks)
    };

    let catalog = LocalCatalogScanner::new(source, &config.clickhouse.default_path)
        .scan(None, cancel)
        .await?;

    for warning in &catalog.warnings {
        match warning {
            ScanWarning::DiskFallback { reason } => warn!(
                "can't resolve disks ({}), will try backups directly from {}",
                reason,
                config.clickhouse.default_path.display()
            ),
            ScanWarning::Unreadable { name, reason } => {
                warn!("skipping backup entry '{}': {}", name, reason)
            }
        }
    }
    Ok(catalog)
}
