//! Object storage interface for radar data (S3 compatible).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use object_store::{aws::AmazonS3Builder, memory::InMemory, path::Path, ObjectStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

use vpts_common::{storage_url, VptsError, VptsResult};

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStorageConfig {
    /// S3 endpoint URL; empty for the AWS default
    #[serde(default)]
    pub endpoint: String,
    /// Bucket name
    #[serde(default)]
    pub bucket: String,
    /// Access key ID; empty to use the ambient AWS credential chain
    #[serde(default)]
    pub access_key_id: String,
    /// Secret access key
    #[serde(default)]
    pub secret_access_key: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Allow HTTP (for local S3 emulators)
    #[serde(default)]
    pub allow_http: bool,
}

fn default_region() -> String {
    "eu-west-1".to_string()
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            bucket: "aloftdata".to_string(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            region: default_region(),
            allow_http: false,
        }
    }
}

impl ObjectStorageConfig {
    /// The same connection settings against another bucket.
    pub fn for_bucket(&self, bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..self.clone()
        }
    }
}

/// A listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: usize,
    pub last_modified: DateTime<Utc>,
}

/// Object storage client bound to one bucket.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> VptsResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region);

        if !config.endpoint.is_empty() {
            builder = builder.with_endpoint(&config.endpoint);
        }
        if !config.access_key_id.is_empty() {
            builder = builder
                .with_access_key_id(&config.access_key_id)
                .with_secret_access_key(&config.secret_access_key);
        }
        if config.allow_http {
            builder = builder.with_allow_http(true);
        }

        let store = builder
            .build()
            .map_err(|e| VptsError::StorageError(format!("Failed to create S3 client: {}", e)))?;

        Ok(Self::from_store(Arc::new(store), &config.bucket))
    }

    /// Wrap an existing store.
    pub fn from_store(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// An empty in-memory bucket.
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::from_store(Arc::new(InMemory::new()), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// `s3://` URL of a key in this bucket.
    pub fn url(&self, path: &str) -> String {
        storage_url(&self.bucket, path)
    }

    /// Write bytes to a path in the bucket, replacing any existing object.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, path = %path))]
    pub async fn put(&self, path: &str, data: Bytes) -> VptsResult<()> {
        let location = Path::from(path);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data.into())
            .await
            .map_err(|e| VptsError::StorageError(format!("Failed to write {}: {}", path, e)))?;

        Ok(())
    }

    /// Read bytes from a path.
    ///
    /// A missing object is reported as [`VptsError::NotFound`].
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get(&self, path: &str) -> VptsResult<Bytes> {
        let location = Path::from(path);

        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => VptsError::NotFound(self.url(path)),
            e => VptsError::StorageError(format!("Failed to read {}: {}", path, e)),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| VptsError::StorageError(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Stream the bytes of an object without buffering the whole body.
    ///
    /// A missing object is reported as [`VptsError::NotFound`] before any
    /// bytes are yielded; read failures surface as stream items.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn get_stream(&self, path: &str) -> VptsResult<BoxStream<'static, VptsResult<Bytes>>> {
        let location = Path::from(path);

        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => VptsError::NotFound(self.url(path)),
            e => VptsError::StorageError(format!("Failed to read {}: {}", path, e)),
        })?;
        debug!(size = result.meta.size, "Streaming object");

        let key = path.to_string();
        Ok(result
            .into_stream()
            .map_err(move |e| VptsError::StorageError(format!("Failed to read {}: {}", key, e)))
            .boxed())
    }

    /// Check if an object exists.
    pub async fn exists(&self, path: &str) -> VptsResult<bool> {
        let location = Path::from(path);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(VptsError::StorageError(format!(
                "Failed to check {}: {}",
                path, e
            ))),
        }
    }

    /// List object keys with a given prefix.
    pub async fn list(&self, prefix: &str) -> VptsResult<Vec<String>> {
        Ok(self
            .list_with_meta(prefix)
            .await?
            .into_iter()
            .map(|entry| entry.key)
            .collect())
    }

    /// List objects with a given prefix, including size and modification time.
    #[instrument(skip(self), fields(bucket = %self.bucket, prefix = %prefix))]
    pub async fn list_with_meta(&self, prefix: &str) -> VptsResult<Vec<ObjectEntry>> {
        let prefix_path = Path::from(prefix);
        let mut entries = Vec::new();

        let mut stream = self.store.list(Some(&prefix_path));
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| VptsError::StorageError(format!("List failed: {}", e)))?
        {
            entries.push(ObjectEntry {
                key: meta.location.to_string(),
                size: meta.size,
                last_modified: meta.last_modified,
            });
        }

        debug!(objects = entries.len(), "Listed objects");
        Ok(entries)
    }

    /// Delete an object.
    #[instrument(skip(self), fields(bucket = %self.bucket, path = %path))]
    pub async fn delete(&self, path: &str) -> VptsResult<()> {
        let location = Path::from(path);

        self.store
            .delete(&location)
            .await
            .map_err(|e| VptsError::StorageError(format!("Failed to delete {}: {}", path, e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let storage = ObjectStorage::in_memory("aloftdata");
        storage
            .put("baltrad/daily/nosta/2023/a.csv", Bytes::from_static(b"one"))
            .await
            .unwrap();
        storage
            .put("baltrad/daily/nosta/2023/a.csv", Bytes::from_static(b"two"))
            .await
            .unwrap();
        let data = storage.get("baltrad/daily/nosta/2023/a.csv").await.unwrap();
        assert_eq!(&data[..], b"two");
    }

    #[tokio::test]
    async fn test_get_stream_yields_whole_object() {
        let storage = ObjectStorage::in_memory("aloft-inventory");
        let body: Vec<u8> = (0..64 * 1024).map(|i| (i % 251) as u8).collect();
        storage
            .put("inventory/data/a.csv.gz", Bytes::from(body.clone()))
            .await
            .unwrap();

        let chunks: Vec<Bytes> = storage
            .get_stream("inventory/data/a.csv.gz")
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), body);

        let err = storage.get_stream("inventory/data/missing.csv.gz").await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let storage = ObjectStorage::in_memory("aloftdata");
        let err = storage.get("baltrad/missing.h5").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.code(), "vanished_source");
        assert!(!storage.exists("baltrad/missing.h5").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let storage = ObjectStorage::in_memory("aloftdata");
        for key in [
            "baltrad/daily/nosta/2023/nosta_vpts_20230311.csv",
            "baltrad/daily/nosta/2023/nosta_vpts_20230312.csv",
            "baltrad/daily/nohgb/2023/nohgb_vpts_20230311.csv",
        ] {
            storage.put(key, Bytes::from_static(b"x")).await.unwrap();
        }

        let mut keys = storage.list("baltrad/daily/nosta/2023").await.unwrap();
        keys.sort();
        assert_eq!(
            keys,
            vec![
                "baltrad/daily/nosta/2023/nosta_vpts_20230311.csv",
                "baltrad/daily/nosta/2023/nosta_vpts_20230312.csv",
            ]
        );

        let entries = storage.list_with_meta("baltrad/daily/nohgb").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].size, 1);
    }

    #[tokio::test]
    async fn test_delete() {
        let storage = ObjectStorage::in_memory("aloftdata");
        storage.put("a/b.csv", Bytes::from_static(b"x")).await.unwrap();
        assert!(storage.exists("a/b.csv").await.unwrap());
        storage.delete("a/b.csv").await.unwrap();
        assert!(!storage.exists("a/b.csv").await.unwrap());
    }

    #[test]
    fn test_url_and_config() {
        let storage = ObjectStorage::in_memory("aloftdata");
        assert_eq!(storage.url("baltrad/x.h5"), "s3://aloftdata/baltrad/x.h5");

        let config = ObjectStorageConfig::default().for_bucket("inventory");
        assert_eq!(config.bucket, "inventory");
        assert_eq!(config.region, "eu-west-1");
    }
}
