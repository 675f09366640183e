//! Object-store abstraction used by remote listing and uploads.

pub mod cloud;
pub mod local;

use crate::utils::errors::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use cloud::CloudObjectStore;
pub use local::LocalObjectStore;

/// Streamed object body. Producers yield chunks as they are read.
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

/// One entry returned by a delimited listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Name relative to the listed prefix, without separators.
    pub name: String,
    /// True for a common prefix ("directory"), false for an object.
    #[serde(default)]
    pub is_prefix: bool,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Entries directly below `prefix` (one level, `/` delimited).
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>>;

    /// Object metadata, `None` when the key does not exist.
    async fn stat(&self, key: &str) -> Result<Option<ObjectEntry>>;

    /// Whole object body, `None` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Upload `body` under `key`, replacing any existing object.
    async fn put_stream(&self, key: &str, content_type: &str, body: ByteStream) -> Result<()>;
}

/// Join key segments with `/`, dropping empty and `.` segments.
///
/// Deterministic for a given input, so re-running an upload produces the
/// same key set.
pub fn join_key<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}
