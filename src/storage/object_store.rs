//! S3-compatible object-store client (§5: "a single object-store client per
//! process, reused"; §6: object-store key layout).

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use tracing::{debug, warn};

use crate::config::ObjectStoreConfig;
use crate::errors::StorageError;

/// Abstraction over the remote upload target, so the Upload Queue and
/// Pipeline steps don't depend on the AWS SDK directly.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_file(&self, key: &str, local_path: &std::path::Path, content_type: &str) -> Result<(), StorageError>;
    async fn put_bytes(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;
    /// Re-fetches an object (§4.5 step 1: `prefetch-flac` downloads segments
    /// missing from local disk).
    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError>;
    fn public_url(&self, key: &str) -> String;
}

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    endpoint_url: Option<String>,
}

impl S3ObjectStore {
    pub async fn new(config: &ObjectStoreConfig) -> Self {
        let mut loader = aws_config::from_env();
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let shared_config = loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&shared_config);
        if let Some(endpoint) = &config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket: config.bucket.clone(),
            endpoint_url: config.endpoint_url.clone(),
        }
    }

    fn classify(err: impl std::fmt::Display, transient: bool) -> StorageError {
        if transient {
            StorageError::transient(err.to_string())
        } else {
            StorageError::permanent(err.to_string())
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_file(&self, key: &str, local_path: &std::path::Path, content_type: &str) -> Result<(), StorageError> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| StorageError::permanent(format!("reading {}: {e}", local_path.display())))?;

        debug!(bucket = %self.bucket, key, "uploading object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Self::classify(e, true))?;
        Ok(())
    }

    async fn put_bytes(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        debug!(bucket = %self.bucket, key, size = bytes.len(), "uploading object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| Self::classify(e, true))?;
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::classify(e, true))?;
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| Self::classify(e, true))?
            .into_bytes();
        Ok(bytes.to_vec())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::classify(e, true))?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let mut continuation_token = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(prefix);
            if let Some(token) = &continuation_token {
                request = request.continuation_token(token);
            }
            let response = request.send().await.map_err(|e| Self::classify(e, true))?;

            let keys: Vec<ObjectIdentifier> = response
                .contents()
                .iter()
                .filter_map(|obj| obj.key())
                .filter_map(|key| ObjectIdentifier::builder().key(key).build().ok())
                .collect();

            if !keys.is_empty() {
                let delete = Delete::builder()
                    .set_objects(Some(keys))
                    .build()
                    .map_err(|e| StorageError::permanent(e.to_string()))?;
                self.client
                    .delete_objects()
                    .bucket(&self.bucket)
                    .delete(delete)
                    .send()
                    .await
                    .map_err(|e| Self::classify(e, true))?;
            } else {
                warn!(bucket = %self.bucket, prefix, "no objects found under prefix to delete");
            }

            continuation_token = response.next_continuation_token().map(String::from);
            if continuation_token.is_none() {
                break;
            }
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        match &self.endpoint_url {
            Some(endpoint) => format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }
}
