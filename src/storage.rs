use std::ops::Range;
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore, PutPayload};
use tracing::{debug, info};

use crate::config::StorageConfig;
use crate::error::{GraphliftError, Result};

/// Handle to the staging container.
///
/// Wraps any `object_store` backend together with the container name the
/// build service is told to read from, and whether the backend should be
/// driven through multipart uploads. Cheap to clone and safe to share
/// between concurrent builds.
#[derive(Clone, Debug)]
pub struct BlobStore {
    inner: Arc<dyn ObjectStore>,
    container: String,
    multipart: bool,
}

impl BlobStore {
    pub fn new(inner: Arc<dyn ObjectStore>, container: impl Into<String>, multipart: bool) -> Self {
        Self {
            inner,
            container: container.into(),
            multipart,
        }
    }

    /// In-process store, mostly for tests and dry runs.
    pub fn in_memory(container: impl Into<String>) -> Self {
        Self::new(Arc::new(object_store::memory::InMemory::new()), container, true)
    }

    /// Build a store from configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let inner: Arc<dyn ObjectStore> = match config.backend.as_str() {
            "s3" => {
                let mut builder = object_store::aws::AmazonS3Builder::from_env()
                    .with_bucket_name(&config.bucket)
                    .with_allow_http(config.allow_http);
                if let Some(region) = &config.region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                Arc::new(builder.build()?)
            }
            "gcs" => Arc::new(
                object_store::gcp::GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(&config.bucket)
                    .build()?,
            ),
            "azure" => Arc::new(
                object_store::azure::MicrosoftAzureBuilder::from_env()
                    .with_container_name(&config.bucket)
                    .with_allow_http(config.allow_http)
                    .build()?,
            ),
            "local" => {
                let root = config.local_path.as_deref().ok_or_else(|| {
                    GraphliftError::Config("storage.local_path is required for the local backend".into())
                })?;
                std::fs::create_dir_all(root)?;
                Arc::new(object_store::local::LocalFileSystem::new_with_prefix(root)?)
            }
            "memory" => Arc::new(object_store::memory::InMemory::new()),
            other => {
                return Err(GraphliftError::Config(format!(
                    "unknown storage backend: {other}"
                )))
            }
        };

        info!(
            backend = %config.backend,
            bucket = %config.bucket,
            multipart = config.multipart,
            "initialized blob store"
        );
        Ok(Self::new(inner, config.bucket.clone(), config.multipart))
    }

    /// Container (bucket) name reported to the build service.
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Whether uploads should be split into concurrently sent parts.
    pub fn supports_multipart(&self) -> bool {
        self.multipart
    }

    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.inner
    }

    pub fn path(key: &str) -> Result<Path> {
        Ok(Path::parse(key)?)
    }

    pub async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = Self::path(key)?;
        self.inner
            .put(&path, PutPayload::from(data))
            .await
            .map_err(|e| map_store_error(key, e))?;
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let path = Self::path(key)?;
        let result = self
            .inner
            .get(&path)
            .await
            .map_err(|e| map_store_error(key, e))?;
        Ok(result.bytes().await?)
    }

    pub async fn get_range(&self, key: &str, range: Range<usize>) -> Result<Bytes> {
        let path = Self::path(key)?;
        self.inner
            .get_range(&path, range)
            .await
            .map_err(|e| map_store_error(key, e))
    }

    pub async fn head(&self, key: &str) -> Result<ObjectMeta> {
        let path = Self::path(key)?;
        self.inner
            .head(&path)
            .await
            .map_err(|e| map_store_error(key, e))
    }

    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self.head(key).await {
            Ok(_) => Ok(true),
            Err(GraphliftError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = Self::path(key)?;
        self.inner
            .delete(&path)
            .await
            .map_err(|e| map_store_error(key, e))?;
        debug!(key, "deleted object");
        Ok(())
    }

    pub async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let path = Self::path(prefix)?;
        let metas: Vec<ObjectMeta> = self.inner.list(Some(&path)).try_collect().await?;
        Ok(metas.into_iter().map(|m| m.location.to_string()).collect())
    }
}

fn map_store_error(key: &str, e: object_store::Error) -> GraphliftError {
    match e {
        object_store::Error::NotFound { .. } => GraphliftError::NotFound {
            key: key.to_string(),
        },
        object_store::Error::AlreadyExists { .. } => GraphliftError::AlreadyExists {
            key: key.to_string(),
        },
        other => GraphliftError::Storage(other),
    }
}
