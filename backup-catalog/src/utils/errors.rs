//! Error types for catalog and transfer operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Can't read {}: {source}", path.display())]
    MetadataRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt metadata in {location}: {source}")]
    Corrupt {
        location: String,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("remote_storage is 'none'")]
    RemoteNotConfigured,

    #[error("no disk named 'default' among resolved disks")]
    NoDefaultDisk,

    #[error("backup name is required")]
    NameRequired,

    #[error("backup '{0}' is not found")]
    BackupNotFound(String),

    #[error("no backups found")]
    EmptyCatalog,

    #[error("no penult backup is found")]
    InsufficientHistory,

    #[error("'{0}' undefined")]
    UnrecognizedMode(String),

    #[error("Discovery failed under {}: {reason}", root.display())]
    Discovery { root: PathBuf, reason: String },

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Transfer(#[from] TransferFailure),

    #[error("Cancelled after {completed} entries")]
    Cancelled { completed: usize },

    /// A drain stopped by cancellation; `failed` holds the items that had
    /// already failed before it stopped.
    #[error("Transfer cancelled after {completed} files, {} failed", failed.len())]
    TransferCancelled {
        completed: usize,
        failed: Vec<FailedItem>,
    },
}

/// A single work item that could not be opened, streamed or uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub key: String,
    pub reason: String,
}

/// Aggregate outcome of a drain that had at least one failed item.
///
/// `failed` keeps discovery order, so the first element is the first error
/// encountered.
#[derive(Debug, Clone)]
pub struct TransferFailure {
    pub total: usize,
    pub uploaded: usize,
    pub failed: Vec<FailedItem>,
}

impl TransferFailure {
    pub fn first(&self) -> Option<&FailedItem> {
        self.failed.first()
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|f| f.key.as_str())
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} files failed to transfer",
            self.failed.len(),
            self.total
        )?;
        if let Some(first) = self.first() {
            write!(f, ", first: {}: {}", first.key, first.reason)?;
        }
        Ok(())
    }
}

impl std::error::Error for TransferFailure {}

pub type Result<T> = std::result::Result<T, BackupError>;
