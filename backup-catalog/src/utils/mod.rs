//! Utility modules shared by the catalog, transfer engine and CLI.

pub mod errors;
pub mod logger;
pub mod signal;

pub use errors::{BackupError, FailedItem, Result, TransferFailure};
