//! Object store backed by a local directory tree.
//!
//! Keys map to paths under the root; prefixes are directories. Useful for
//! mounted network volumes and for tests.

use super::{ByteStream, ObjectEntry, ObjectStore};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Prefix of the temp files a `put_stream` writes before renaming.
const UPLOAD_TMP_PREFIX: &str = ".upload-tmp-";

pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a `/`-separated key to a path under the root, rejecting keys
    /// that could escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.starts_with('/') || key.contains('\\') {
            return Err(BackupError::InvalidKey(key.to_string()));
        }
        let relative = Path::new(key);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(BackupError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn entry_from(name: String, info: &Metadata) -> ObjectEntry {
    ObjectEntry {
        name,
        is_prefix: info.is_dir(),
        size: if info.is_dir() { 0 } else { info.len() },
        last_modified: info.modified().ok().map(DateTime::<Utc>::from),
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let dir = self.resolve(prefix)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut listed = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // in-flight uploads
            if name.starts_with(UPLOAD_TMP_PREFIX) {
                continue;
            }
            let info = entry.metadata().await?;
            listed.push(entry_from(name, &info));
        }
        // object stores list in key order
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn stat(&self, key: &str) -> Result<Option<ObjectEntry>> {
        let path = self.resolve(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(info) if info.is_file() => {
                let name = key.rsplit('/').next().unwrap_or(key).to_string();
                Ok(Some(entry_from(name, &info)))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(Some(Bytes::from(body))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_stream(&self, key: &str, _content_type: &str, mut body: ByteStream) -> Result<()> {
        let path = self.resolve(key)?;
        let dir = path
            .parent()
            .ok_or_else(|| BackupError::InvalidKey(key.to_string()))?
            .to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;

        // Stream into a temp file beside the target, then rename, so a
        // listing never sees a partial object.
        let tmp = tempfile::Builder::new()
            .prefix(UPLOAD_TMP_PREFIX)
            .tempfile_in(&dir)?;
        let mut file = tokio::fs::File::from_std(tmp.reopen()?);
        while let Some(chunk) = body.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        drop(file);

        tmp.persist(&path).map_err(|e| BackupError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use tempfile::TempDir;

    fn body(chunks: &[&'static [u8]]) -> ByteStream {
        let chunks: Vec<std::io::Result<Bytes>> =
            chunks.iter().map(|c| Ok(Bytes::from_static(*c))).collect();
        stream::iter(chunks).boxed()
    }

    #[tokio::test]
    async fn test_put_then_get_and_stat() -> Result<()> {
        let dir = TempDir::new()?;
        let store = LocalObjectStore::new(dir.path());

        store
            .put_stream("b1/shadow/part.bin", "binary/octet-stream", body(&[b"abc", b"def"]))
            .await?;

        assert_eq!(store.get("b1/shadow/part.bin").await?, Some(Bytes::from_static(b"abcdef")));
        let entry = store.stat("b1/shadow/part.bin").await?.unwrap();
        assert_eq!(entry.name, "part.bin");
        assert_eq!(entry.size, 6);
        assert!(entry.last_modified.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_keys() -> Result<()> {
        let dir = TempDir::new()?;
        let store = LocalObjectStore::new(dir.path());

        assert_eq!(store.get("nope").await?, None);
        assert_eq!(store.stat("nope").await?, None);
        assert!(store.list("nope").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_one_level_sorted() -> Result<()> {
        let dir = TempDir::new()?;
        let store = LocalObjectStore::new(dir.path());
        store.put_stream("root/b2/x", "text/plain", body(&[b"1"])).await?;
        store.put_stream("root/b1/y", "text/plain", body(&[b"2"])).await?;
        store.put_stream("root/old.tar", "application/x-tar", body(&[b"333"])).await?;

        let entries = store.list("root").await?;
        let names: Vec<_> = entries.iter().map(|e| (e.name.as_str(), e.is_prefix)).collect();
        assert_eq!(names, vec![("b1", true), ("b2", true), ("old.tar", false)]);
        assert_eq!(entries[2].size, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_hides_only_upload_temp_files() -> Result<()> {
        let dir = TempDir::new()?;
        let store = LocalObjectStore::new(dir.path());
        store.put_stream("root/.tmp-restore/metadata.json", "application/json", body(&[b"{}"])).await?;
        std::fs::write(dir.path().join("root").join(".upload-tmp-abc123"), b"partial")?;

        let entries = store.list("root").await?;
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".tmp-restore"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_overwrite_replaces_object() -> Result<()> {
        let dir = TempDir::new()?;
        let store = LocalObjectStore::new(dir.path());
        store.put_stream("k", "text/plain", body(&[b"first"])).await?;
        store.put_stream("k", "text/plain", body(&[b"2nd"])).await?;
        assert_eq!(store.get("k").await?, Some(Bytes::from_static(b"2nd")));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(dir.path());
        assert!(matches!(store.get("../etc/passwd").await, Err(BackupError::InvalidKey(_))));
        assert!(matches!(store.get("/etc/passwd").await, Err(BackupError::InvalidKey(_))));
    }
}
