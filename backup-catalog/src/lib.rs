//! Backup Catalog Library
//!
//! Reconciles backups kept on local disks with those in a remote object
//! store, and uploads backup directories file by file.

pub mod catalog;
pub mod commands;
pub mod config;
pub mod disks;
pub mod storage;
pub mod transfer;
pub mod utils;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::{BackupError, Result};
