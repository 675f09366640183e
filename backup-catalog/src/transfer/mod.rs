//! Directory-to-object-store transfer.
//!
//! A transfer runs in two halves:
//! - discovery walks the local directory into an ordered [`TransferPlan`]
//! - the drain loop uploads the plan one file at a time, in plan order
//!
//! Only one source file is open at any moment. A file that fails to open,
//! read or upload is recorded and skipped; the remaining items still run and
//! the call reports every failed key at the end. Objects uploaded before a
//! failure or cancellation stay in place, and keys depend only on the tree,
//! so running the transfer again resumes it.

pub mod progress_stream;
pub mod walker;

use crate::catalog::BackupDestination;
use crate::storage::join_key;
use crate::utils::errors::{BackupError, FailedItem, Result, TransferFailure};
use futures_util::StreamExt;
use progress_stream::ProgressStream;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use walker::discover;

pub use walker::TransferWorkItem;

/// Content type used when the extension says nothing.
pub const DEFAULT_CONTENT_TYPE: &str = "binary/octet-stream";

/// Advisory content type for an object key.
pub fn content_type_for(key: &str) -> &'static str {
    mime_guess::from_path(key)
        .first_raw()
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

/// Ordered, immutable work list produced by discovery.
#[derive(Debug, Clone)]
pub struct TransferPlan {
    base: String,
    items: Vec<TransferWorkItem>,
}

impl TransferPlan {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[TransferWorkItem] {
        &self.items
    }

    /// Object key an item is uploaded to.
    pub fn key_for(&self, item: &TransferWorkItem) -> String {
        join_key([self.base.as_str(), item.relative_key.as_str()])
    }

    /// Every destination key, in drain order.
    pub fn keys(&self) -> Vec<String> {
        self.items.iter().map(|item| self.key_for(item)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Discovery ran; nothing was uploaded.
    DryRun,
    Completed,
}

#[derive(Debug, Clone)]
pub struct TransferReport {
    pub outcome: TransferOutcome,
    pub files: usize,
    pub bytes: u64,
    /// Destination keys, in upload order (planned order for a dry run).
    pub keys: Vec<String>,
}

pub struct TransferEngine {
    destination: BackupDestination,
}

impl TransferEngine {
    pub fn new(destination: BackupDestination) -> Self {
        Self { destination }
    }

    /// Upload every regular file under `local_path` to
    /// `<root>/<destination_path>/<relative path>`.
    pub async fn transfer(
        &self,
        local_path: &Path,
        destination_path: &str,
        dry_run: bool,
        cancel: &CancellationToken,
    ) -> Result<TransferReport> {
        let plan = self.plan(local_path, destination_path, cancel).await?;

        if dry_run {
            return Ok(TransferReport {
                outcome: TransferOutcome::DryRun,
                files: plan.len(),
                bytes: 0,
                keys: plan.keys(),
            });
        }

        self.drain(plan, cancel).await
    }

    /// Run discovery only.
    pub async fn plan(
        &self,
        local_path: &Path,
        destination_path: &str,
        cancel: &CancellationToken,
    ) -> Result<TransferPlan> {
        let root = local_path.to_path_buf();
        let walk_cancel = cancel.clone();
        let items = tokio::task::spawn_blocking(move || discover(&root, &walk_cancel))
            .await
            .map_err(|e| BackupError::Io(std::io::Error::other(e)))??;

        Ok(TransferPlan {
            base: join_key([self.destination.root(), destination_path]),
            items,
        })
    }

    /// Upload the plan in order, one file at a time.
    pub async fn drain(&self, plan: TransferPlan, cancel: &CancellationToken) -> Result<TransferReport> {
        let total = plan.len();
        let mut uploaded = Vec::with_capacity(total);
        let mut failed = Vec::new();
        let mut bytes = 0u64;

        for (processed, item) in plan.items().iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(BackupError::TransferCancelled {
                    completed: processed,
                    failed,
                });
            }

            let key = plan.key_for(item);
            match self.upload(&key, item).await {
                Ok(sent) => {
                    bytes += sent;
                    uploaded.push(key);
                }
                Err(e) => failed.push(FailedItem {
                    key,
                    reason: e.to_string(),
                }),
            }
        }

        if !failed.is_empty() {
            return Err(TransferFailure {
                total,
                uploaded: uploaded.len(),
                failed,
            }
            .into());
        }

        Ok(TransferReport {
            outcome: TransferOutcome::Completed,
            files: uploaded.len(),
            bytes,
            keys: uploaded,
        })
    }

    async fn upload(&self, key: &str, item: &TransferWorkItem) -> Result<u64> {
        let file = tokio::fs::File::open(&item.source_path).await?;
        let transferred = Arc::new(AtomicU64::new(0));
        let body = ProgressStream::new(ReaderStream::new(file), Arc::clone(&transferred)).boxed();

        self.destination
            .store()
            .put_stream(key, content_type_for(&item.relative_key), body)
            .await?;

        Ok(transferred.load(Ordering::Relaxed))
    }
}
