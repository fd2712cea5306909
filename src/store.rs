//! Object store gateway for fetching raw frames and uploading tensors

use crate::config::Config;
use crate::error::{Result, WorkerError};
use crate::job::ObjectAddress;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::path::Path;
use tracing::{debug, warn};

/// Thin client over an S3-compatible store (MinIO in development).
///
/// Stateless per call: a per-bucket handle is built for each operation,
/// which is cheap enough that no pooling is needed.
pub struct ObjectStoreGateway {
    endpoint: String,
    access_key: String,
    secret_key: String,
}

impl ObjectStoreGateway {
    pub fn new(endpoint: &str, access_key: &str, secret_key: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            access_key: access_key.to_string(),
            secret_key: secret_key.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.store_endpoint,
            &config.store_access_key,
            &config.store_secret_key,
        )
    }

    fn bucket_handle(&self, bucket: &str) -> Result<AmazonS3> {
        let endpoint = if self.endpoint.contains("://") {
            self.endpoint.clone()
        } else {
            format!("http://{}", self.endpoint)
        };

        AmazonS3Builder::new()
            .with_endpoint(endpoint)
            .with_allow_http(true)
            .with_region("us-east-1")
            .with_access_key_id(&self.access_key)
            .with_secret_access_key(&self.secret_key)
            .with_bucket_name(bucket)
            .build()
            .map_err(WorkerError::StoreClient)
    }

    /// Downloads the object at `address` to `local_path`, creating parent
    /// directories as needed.
    ///
    /// A missing object is logged distinctly from other store errors, but
    /// both surface as a single fetch-failure outcome.
    pub async fn fetch(&self, address: &str, local_path: &Path) -> Result<()> {
        let parsed = ObjectAddress::parse(address)?;

        if let Some(parent) = local_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let store = self.bucket_handle(&parsed.bucket)?;
        let bytes = match store.get(&ObjectPath::from(parsed.key.as_str())).await {
            Ok(result) => result.bytes().await.map_err(|e| WorkerError::Fetch {
                address: address.to_string(),
                reason: e.to_string(),
            })?,
            Err(object_store::Error::NotFound { .. }) => {
                warn!(
                    "Object '{}' was not found in bucket '{}'",
                    parsed.key, parsed.bucket
                );
                return Err(WorkerError::Fetch {
                    address: address.to_string(),
                    reason: "object not found".to_string(),
                });
            }
            Err(e) => {
                return Err(WorkerError::Fetch {
                    address: address.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        tokio::fs::write(local_path, &bytes).await?;
        debug!("Fetched {} bytes to {}", bytes.len(), local_path.display());
        Ok(())
    }

    /// Uploads the file at `local_path` to `bucket`/`key`.
    pub async fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<()> {
        let data = tokio::fs::read(local_path).await?;
        let store = self.bucket_handle(bucket)?;
        store
            .put(&ObjectPath::from(key), data.into())
            .await
            .map_err(|e| WorkerError::Upload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: e,
            })?;
        debug!("Uploaded {} to {}/{}", local_path.display(), bucket, key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetch_rejects_invalid_address_before_any_io() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("never-written");
        let gateway = ObjectStoreGateway::new("localhost:9000", "minioadmin", "minioadmin");
        let err = gateway
            .fetch("https://raw/frame.fits", &target)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InvalidAddress { .. }));
        assert!(!target.exists());
    }

    #[test]
    fn bucket_handle_builds_for_plain_endpoint() {
        let gateway = ObjectStoreGateway::new("localhost:9000", "minioadmin", "minioadmin");
        assert!(gateway.bucket_handle("user-data").is_ok());
    }
}
