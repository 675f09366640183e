//! Backup catalog: the ordered list of backups in one storage scope.
//!
//! Local and remote scans both produce `Vec<BackupRecord>` sorted by
//! [`BackupRecord::ordered_at`]; [`query::select`] works on either.

pub mod local;
pub mod metadata;
pub mod query;
pub mod remote;

use chrono::{DateTime, Utc};
use metadata::{BackupMetadata, TableTitle};
use serde::Serialize;
use std::collections::BTreeMap;

pub use local::{LocalCatalog, LocalCatalogScanner, ScanWarning};
pub use metadata::{LoadOutcome, MetadataStore};
pub use query::{select, QueryMode, Selection};
pub use remote::{BackupDestination, ListQuery, RemoteCatalogClient};

/// Where a record was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Local,
    Remote,
}

/// One backup as seen by a catalog scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackupRecord {
    pub name: String,
    pub location: Location,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<DateTime<Utc>>,
    pub data_size: u64,
    pub metadata_size: u64,
    pub compressed_size: u64,
    pub rbac_size: u64,
    pub config_size: u64,
    pub data_format: String,
    pub legacy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_backup: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broken: Option<String>,
    pub version: String,
    pub clickhouse_version: String,
    pub tags: String,
    pub disks: BTreeMap<String, String>,
    pub tables: Vec<TableTitle>,
}

impl BackupRecord {
    /// Record built from a parsed metadata file.
    pub fn from_metadata(metadata: BackupMetadata, location: Location) -> Self {
        let required_backup = Some(metadata.required_backup).filter(|r| !r.is_empty());
        let broken = metadata.broken.filter(|b| !b.is_empty());
        Self {
            name: metadata.backup_name,
            location,
            created_at: metadata.creation_date,
            uploaded_at: None,
            data_size: metadata.data_size,
            metadata_size: metadata.metadata_size,
            compressed_size: metadata.compressed_size,
            rbac_size: metadata.rbac_size,
            config_size: metadata.config_size,
            data_format: metadata.data_format,
            legacy: false,
            required_backup,
            broken,
            version: metadata.version,
            clickhouse_version: metadata.clickhouse_version,
            tags: metadata.tags,
            disks: metadata.disks,
            tables: metadata.tables,
        }
    }

    /// Record for a backup without metadata. Sizes and format stay unknown.
    pub fn legacy(name: impl Into<String>, location: Location, created_at: DateTime<Utc>) -> Self {
        Self {
            legacy: true,
            ..Self::bare(name, location, created_at)
        }
    }

    /// Record carrying only a name and a timestamp.
    pub fn bare(name: impl Into<String>, location: Location, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            location,
            created_at,
            uploaded_at: None,
            data_size: 0,
            metadata_size: 0,
            compressed_size: 0,
            rbac_size: 0,
            config_size: 0,
            data_format: String::new(),
            legacy: false,
            required_backup: None,
            broken: None,
            version: String::new(),
            clickhouse_version: String::new(),
            tags: String::new(),
            disks: BTreeMap::new(),
            tables: Vec::new(),
        }
    }

    /// Timestamp the catalog is ordered by.
    pub fn ordered_at(&self) -> DateTime<Utc> {
        match self.location {
            Location::Local => self.created_at,
            Location::Remote => self.uploaded_at.unwrap_or(self.created_at),
        }
    }

    /// Size to report, or `None` when it is unknown or untrustworthy.
    ///
    /// Broken backups and local legacy backups have no meaningful size.
    /// A non-zero `compressed_size` means the data is stored compressed.
    pub fn effective_size(&self) -> Option<u64> {
        if self.broken.is_some() {
            return None;
        }
        if self.legacy && self.location == Location::Local {
            return None;
        }
        if self.compressed_size > 0 {
            Some(self.compressed_size + self.metadata_size)
        } else {
            Some(self.data_size + self.metadata_size)
        }
    }

    /// Description of how table data is stored, `None` when unknown.
    pub fn description(&self) -> Option<&str> {
        if let Some(reason) = &self.broken {
            return Some(reason.as_str());
        }
        if self.legacy || self.data_format.is_empty() {
            return None;
        }
        Some(self.data_format.as_str())
    }
}

/// Stable sort ascending by [`BackupRecord::ordered_at`].
pub fn sort_catalog(records: &mut [BackupRecord]) {
    // slice::sort_by_key is stable, ties keep discovery order
    records.sort_by_key(|r| r.ordered_at());
}
