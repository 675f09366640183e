//! `upload` command: push one local backup to the remote destination.

use super::{destination_from_config, scan_local};
use crate::catalog::local::BACKUP_DIR;
use crate::config::Config;
use crate::disks::default_data_path;
use crate::transfer::{TransferEngine, TransferOutcome, TransferReport};
use crate::utils::errors::{BackupError, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub async fn run(
    config: &Config,
    name: &str,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<TransferReport> {
    let destination = destination_from_config(config)?.ok_or(BackupError::RemoteNotConfigured)?;

    let catalog = scan_local(config, cancel).await?;
    let backup = catalog.find(name)?;
    let local_path = default_data_path(&catalog.disks)?
        .join(BACKUP_DIR)
        .join(&backup.name);

    let engine = TransferEngine::new(destination);
    let plan = engine.plan(&local_path, &backup.name, cancel).await?;
    info!("Ready for upload {} files", plan.len());

    if dry_run {
        for key in plan.keys() {
            info!("dry-run: would upload {}", key);
        }
        info!("dry-run: skipping upload of '{}'", backup.name);
        return Ok(TransferReport {
            outcome: TransferOutcome::DryRun,
            files: plan.len(),
            bytes: 0,
            keys: plan.keys(),
        });
    }

    match engine.drain(plan, cancel).await {
        Ok(report) => {
            info!(
                "uploaded '{}': {} files, {} bytes",
                backup.name, report.files, report.bytes
            );
            Ok(report)
        }
        Err(BackupError::Transfer(failure)) => {
            for item in &failure.failed {
                error!("can't upload {}: {}", item.key, item.reason);
            }
            Err(BackupError::Transfer(failure))
        }
        Err(BackupError::TransferCancelled { completed, failed }) => {
            for item in &failed {
                error!("can't upload {}: {}", item.key, item.reason);
            }
            Err(BackupError::TransferCancelled { completed, failed })
        }
        Err(e) => Err(e),
    }
}
