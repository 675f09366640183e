//! Test helpers shared by catalog and transfer tests.

use crate::storage::{ByteStream, ObjectEntry, ObjectStore};
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Wraps a store, counting calls and recording uploads in order.
pub struct RecordingStore<S> {
    inner: S,
    lists: AtomicUsize,
    gets: AtomicUsize,
    puts: Mutex<Vec<(String, String)>>,
    fail_puts: HashSet<String>,
    cancel_on_put: Option<(String, CancellationToken)>,
}

impl<S: ObjectStore> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            lists: AtomicUsize::new(0),
            gets: AtomicUsize::new(0),
            puts: Mutex::new(Vec::new()),
            fail_puts: HashSet::new(),
            cancel_on_put: None,
        }
    }

    /// Make uploads of `key` fail with a network error.
    pub fn failing_put(mut self, key: &str) -> Self {
        self.fail_puts.insert(key.to_string());
        self
    }

    /// Cancel `token` when an upload of `key` is attempted.
    pub fn cancelling_on_put(mut self, key: &str, token: CancellationToken) -> Self {
        self.cancel_on_put = Some((key.to_string(), token));
        self
    }

    pub fn list_calls(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Uploaded keys in upload order.
    pub fn put_keys(&self) -> Vec<String> {
        self.puts.lock().unwrap().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.puts
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for RecordingStore<S> {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.inner.list(prefix).await
    }

    async fn stat(&self, key: &str) -> Result<Option<ObjectEntry>> {
        self.inner.stat(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put_stream(&self, key: &str, content_type: &str, body: ByteStream) -> Result<()> {
        if let Some((cancel_key, token)) = &self.cancel_on_put {
            if cancel_key == key {
                token.cancel();
            }
        }
        if self.fail_puts.contains(key) {
            return Err(BackupError::Network(format!("PUT {key} refused")));
        }
        self.inner.put_stream(key, content_type, body).await?;
        self.puts
            .lock()
            .unwrap()
            .push((key.to_string(), content_type.to_string()));
        Ok(())
    }
}
