//! Object store backed by the `object_store` crate (S3 and S3-compatible
//! services such as MinIO).
//!
//! Keys go through [`object_store::path::Path`], which percent-encodes
//! characters that are not safe in a URL path, so `#` or `?` in a file name
//! stays part of the key.

use super::{ByteStream, ObjectEntry, ObjectStore};
use crate::config::S3Config;
use crate::utils::errors::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{
    Attribute, Attributes, ClientOptions, ObjectStore as _, PutMultipartOpts, WriteMultipart,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Parts buffered or in flight per upload before the writer waits.
const MAX_PARTS_IN_FLIGHT: usize = 4;

pub struct CloudObjectStore {
    inner: Arc<dyn object_store::ObjectStore>,
}

impl CloudObjectStore {
    pub fn new(inner: Arc<dyn object_store::ObjectStore>) -> Self {
        Self { inner }
    }

    /// Build an S3 client. Settings left unset in `config` are taken from the
    /// usual `AWS_*` environment variables.
    pub fn s3(config: &S3Config) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(BackupError::Config(
                "s3.bucket is required for remote_storage = \"s3\"".into(),
            ));
        }

        let client_options = ClientOptions::new()
            .with_connect_timeout(Duration::from_secs(30))
            .with_allow_http(config.allow_http);

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_client_options(client_options);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(key_id) = &config.access_key {
            builder = builder.with_access_key_id(key_id);
        }
        if let Some(secret) = &config.secret_key {
            builder = builder.with_secret_access_key(secret);
        }

        Ok(Self::new(Arc::new(builder.build()?)))
    }
}

fn is_not_found(err: &object_store::Error) -> bool {
    matches!(err, object_store::Error::NotFound { .. })
}

#[async_trait]
impl ObjectStore for CloudObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let prefix = Path::from(prefix);
        let prefix = (!prefix.as_ref().is_empty()).then_some(prefix);
        let listing = self.inner.list_with_delimiter(prefix.as_ref()).await?;

        let prefixes = listing.common_prefixes.into_iter().filter_map(|path| {
            path.filename().map(|name| ObjectEntry {
                name: name.to_string(),
                is_prefix: true,
                size: 0,
                last_modified: None,
            })
        });
        let objects = listing.objects.into_iter().filter_map(|meta| {
            meta.location.filename().map(|name| ObjectEntry {
                name: name.to_string(),
                is_prefix: false,
                size: meta.size as u64,
                last_modified: Some(meta.last_modified),
            })
        });

        let mut entries: Vec<ObjectEntry> = prefixes.chain(objects).collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, key: &str) -> Result<Option<ObjectEntry>> {
        match self.inner.head(&Path::from(key)).await {
            Ok(meta) => Ok(Some(ObjectEntry {
                name: meta.location.filename().unwrap_or(key).to_string(),
                is_prefix: false,
                size: meta.size as u64,
                last_modified: Some(meta.last_modified),
            })),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match self.inner.get(&Path::from(key)).await {
            Ok(result) => Ok(Some(result.bytes().await?)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_stream(&self, key: &str, content_type: &str, mut body: ByteStream) -> Result<()> {
        let location = Path::from(key);
        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        let opts = PutMultipartOpts {
            attributes,
            ..Default::default()
        };

        let upload = self.inner.put_multipart_opts(&location, opts).await?;
        let mut writer = WriteMultipart::new(upload);

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    if let Err(abort) = writer.abort().await {
                        debug!("abort of {} failed: {}", key, abort);
                    }
                    return Err(e.into());
                }
            };
            if let Err(e) = writer.wait_for_capacity(MAX_PARTS_IN_FLIGHT).await {
                if let Err(abort) = writer.abort().await {
                    debug!("abort of {} failed: {}", key, abort);
                }
                return Err(e.into());
            }
            writer.write(&chunk);
        }

        writer.finish().await?;
        Ok(())
    }
}
