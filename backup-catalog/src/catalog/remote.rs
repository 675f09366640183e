//! Remote backup catalog read from an object store.
//!
//! Layout under the destination root:
//! - `<root>/<name>/metadata.json` plus data objects for current backups
//! - `<root>/<name>` as a single archive object for legacy backups

use super::metadata::{BackupMetadata, METADATA_FILE};
use super::{sort_catalog, BackupRecord, Location};
use crate::storage::{join_key, ObjectEntry, ObjectStore};
use crate::utils::errors::{BackupError, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const MISSING_METADATA: &str = "can't find metadata.json";

/// Parameters of one listing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Fetch and parse `metadata.json` for every backup.
    pub parse_metadata: bool,
    /// Fetch and parse metadata for backups whose name is at or after this
    /// bound, even when `parse_metadata` is false.
    pub metadata_from: Option<String>,
}

impl ListQuery {
    fn wants_metadata(&self, name: &str) -> bool {
        self.parse_metadata
            || self
                .metadata_from
                .as_deref()
                .is_some_and(|bound| name >= bound)
    }
}

/// A configured remote location holding backups.
#[derive(Clone)]
pub struct BackupDestination {
    store: Arc<dyn ObjectStore>,
    root: String,
}

impl BackupDestination {
    pub fn new(store: Arc<dyn ObjectStore>, root: &str) -> Self {
        Self {
            store,
            root: join_key([root]),
        }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// One listing pass over the destination root, ordered by upload date.
    pub async fn backup_list(
        &self,
        query: &ListQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<BackupRecord>> {
        let entries = self.store.list(&self.root).await?;
        let mut backups = Vec::with_capacity(entries.len());

        for entry in entries {
            if cancel.is_cancelled() {
                return Err(BackupError::Cancelled {
                    completed: backups.len(),
                });
            }
            let record = if entry.is_prefix {
                self.backup_from_prefix(&entry.name, query).await?
            } else {
                legacy_archive(entry)
            };
            backups.push(record);
        }

        sort_catalog(&mut backups);
        Ok(backups)
    }

    async fn backup_from_prefix(&self, name: &str, query: &ListQuery) -> Result<BackupRecord> {
        let key = join_key([self.root.as_str(), name, METADATA_FILE]);
        let Some(stat) = self.store.stat(&key).await? else {
            let mut record = BackupRecord::bare(name, Location::Remote, DateTime::<Utc>::default());
            record.broken = Some(MISSING_METADATA.to_string());
            return Ok(record);
        };

        let mut record = if query.wants_metadata(name) {
            match self.store.get(&key).await? {
                Some(body) => {
                    let mut metadata = BackupMetadata::from_slice(&body, &key)?;
                    if metadata.backup_name.is_empty() {
                        metadata.backup_name = name.to_string();
                    }
                    BackupRecord::from_metadata(metadata, Location::Remote)
                }
                // deleted between stat and get
                None => {
                    let mut record =
                        BackupRecord::bare(name, Location::Remote, DateTime::<Utc>::default());
                    record.broken = Some(MISSING_METADATA.to_string());
                    record
                }
            }
        } else {
            BackupRecord::bare(name, Location::Remote, stat.last_modified.unwrap_or_default())
        };
        record.uploaded_at = stat.last_modified;
        Ok(record)
    }
}

fn legacy_archive(entry: ObjectEntry) -> BackupRecord {
    let uploaded_at = entry.last_modified.unwrap_or_default();
    let mut record = BackupRecord::legacy(entry.name, Location::Remote, uploaded_at);
    record.uploaded_at = Some(uploaded_at);
    record.data_size = entry.size;
    record
}

/// Lists backups at the configured remote destination.
pub struct RemoteCatalogClient {
    destination: Option<BackupDestination>,
}

impl RemoteCatalogClient {
    pub fn new(destination: Option<BackupDestination>) -> Self {
        Self { destination }
    }

    /// Ordered remote catalog.
    ///
    /// With `parse_metadata == false` the first pass only lists names. Some
    /// backends list a backup that is still being uploaded without its final
    /// metadata, so a non-empty result is always re-listed once with full
    /// metadata, anchored at the newest name. Every returned backup therefore
    /// carries resolved metadata, the newest one included.
    pub async fn list(
        &self,
        parse_metadata: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<BackupRecord>> {
        let destination = self
            .destination
            .as_ref()
            .ok_or(BackupError::RemoteNotConfigured)?;

        let query = ListQuery {
            parse_metadata,
            metadata_from: None,
        };
        let backups = destination.backup_list(&query, cancel).await?;
        if parse_metadata {
            return Ok(backups);
        }

        match backups.last() {
            Some(newest) => {
                let query = ListQuery {
                    parse_metadata: true,
                    metadata_from: Some(newest.name.clone()),
                };
                destination.backup_list(&query, cancel).await
            }
            None => Ok(backups),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::metadata::MetadataStore;
    use crate::storage::LocalObjectStore;
    use crate::testutil::RecordingStore;
    use chrono::TimeZone;
    use std::fs;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_remote_backup(bucket: &TempDir, name: &str, data_size: u64, uploaded: u64) {
        let dir = bucket.path().join("cluster").join(name);
        fs::create_dir_all(&dir).unwrap();
        let metadata = BackupMetadata {
            backup_name: name.to_string(),
            creation_date: Utc.timestamp_opt(uploaded as i64, 0).unwrap(),
            data_size,
            data_format: "tar".to_string(),
            ..Default::default()
        };
        MetadataStore::save(&dir, &metadata).unwrap();
        let file = fs::File::options()
            .write(true)
            .open(dir.join(METADATA_FILE))
            .unwrap();
        file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(uploaded))
            .unwrap();
    }

    fn destination(bucket: &TempDir) -> (Arc<RecordingStore<LocalObjectStore>>, BackupDestination) {
        let store = Arc::new(RecordingStore::new(LocalObjectStore::new(bucket.path())));
        let destination = BackupDestination::new(store.clone(), "/cluster/");
        (store, destination)
    }

    #[tokio::test]
    async fn test_not_configured_fails_fast() {
        let client = RemoteCatalogClient::new(None);
        let err = client.list(true, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, BackupError::RemoteNotConfigured));
    }

    #[tokio::test]
    async fn test_parse_metadata_lists_once() {
        let bucket = TempDir::new().unwrap();
        write_remote_backup(&bucket, "b1", 10, 1_000);
        write_remote_backup(&bucket, "b2", 20, 2_000);
        let (store, destination) = destination(&bucket);

        let backups = RemoteCatalogClient::new(Some(destination))
            .list(true, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.list_calls(), 1);
        assert_eq!(backups.len(), 2);
        assert!(backups.iter().all(|b| b.data_size > 0 && b.location == Location::Remote));
    }

    #[tokio::test]
    async fn test_cheap_listing_relists_anchored_at_newest() {
        let bucket = TempDir::new().unwrap();
        // "a-newest" sorts first by name but last by upload date
        write_remote_backup(&bucket, "a-newest", 30, 3_000);
        write_remote_backup(&bucket, "b-old", 10, 1_000);
        write_remote_backup(&bucket, "c-mid", 20, 2_000);
        let (store, destination) = destination(&bucket);

        let backups = RemoteCatalogClient::new(Some(destination))
            .list(false, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.list_calls(), 2);
        let names: Vec<_> = backups.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["b-old", "c-mid", "a-newest"]);

        let newest = backups.last().unwrap();
        assert_eq!(newest.data_size, 30);
        assert_eq!(newest.data_format, "tar");
        assert_eq!(
            newest.uploaded_at,
            Some(Utc.timestamp_opt(3_000, 0).unwrap())
        );
        // older entries come back with their metadata as well
        assert_eq!(backups[0].data_size, 10);
        assert_eq!(backups[1].data_size, 20);
        assert!(backups.iter().all(|b| b.data_format == "tar"));
        // nothing fetched on the first pass, every backup on the second
        assert_eq!(store.get_calls(), 3);
    }

    #[tokio::test]
    async fn test_cheap_listing_on_empty_bucket_lists_once() {
        let bucket = TempDir::new().unwrap();
        let (store, destination) = destination(&bucket);

        let backups = RemoteCatalogClient::new(Some(destination))
            .list(false, &CancellationToken::new())
            .await
            .unwrap();

        assert!(backups.is_empty());
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn test_metadata_bound_limits_parsing() {
        let bucket = TempDir::new().unwrap();
        write_remote_backup(&bucket, "b1", 10, 1_000);
        write_remote_backup(&bucket, "b2", 20, 2_000);
        let (store, destination) = destination(&bucket);

        let query = ListQuery {
            parse_metadata: false,
            metadata_from: Some("b2".to_string()),
        };
        let backups = destination
            .backup_list(&query, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(store.get_calls(), 1);
        assert_eq!(backups[0].data_size, 0);
        assert_eq!(backups[1].data_size, 20);
    }

    #[tokio::test]
    async fn test_legacy_archive_and_broken_prefix() {
        let bucket = TempDir::new().unwrap();
        write_remote_backup(&bucket, "current", 10, 5_000);
        fs::write(bucket.path().join("cluster").join("old.tar.gz"), vec![0u8; 64]).unwrap();
        fs::create_dir_all(bucket.path().join("cluster").join("half-uploaded").join("shadow")).unwrap();
        let (_store, destination) = destination(&bucket);

        let backups = destination
            .backup_list(&ListQuery { parse_metadata: true, metadata_from: None }, &CancellationToken::new())
            .await
            .unwrap();

        let legacy = backups.iter().find(|b| b.name == "old.tar.gz").unwrap();
        assert!(legacy.legacy);
        assert_eq!(legacy.effective_size(), Some(64));

        let broken = backups.iter().find(|b| b.name == "half-uploaded").unwrap();
        assert_eq!(broken.broken.as_deref(), Some(MISSING_METADATA));
        assert_eq!(broken.effective_size(), None);
    }

    #[tokio::test]
    async fn test_corrupt_remote_metadata_is_fatal() {
        let bucket = TempDir::new().unwrap();
        let dir = bucket.path().join("cluster").join("bad");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(METADATA_FILE), b"{{").unwrap();
        let (_store, destination) = destination(&bucket);

        let err = RemoteCatalogClient::new(Some(destination))
            .list(true, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Corrupt { .. }));
    }
}
