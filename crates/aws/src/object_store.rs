use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::error::DisplayErrorContext;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound { bucket: String, key: String },
    #[error("{operation} failed for `{bucket}/{key}`: {reason}")]
    Request { operation: &'static str, bucket: String, key: String, reason: String },
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Reads the whole object body.
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;
    async fn copy(
        &self,
        bucket: &str,
        source_key: &str,
        destination_key: &str,
    ) -> Result<(), StorageError>;
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError>;
}

#[derive(Clone, Debug)]
pub struct S3ObjectStore {
    inner: s3::Client,
}

impl S3ObjectStore {
    pub fn new(inner: s3::Client) -> Self {
        Self { inner }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        Self::new(s3::Client::new(config))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self))]
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let resp = self.inner.get_object().bucket(bucket).key(key).send().await.map_err(|error| {
            let not_found = error.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false);
            if not_found {
                StorageError::NotFound { bucket: bucket.to_owned(), key: key.to_owned() }
            } else {
                request_error("get_object", bucket, key, DisplayErrorContext(&error))
            }
        })?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|error| request_error("get_object body", bucket, key, error))?;
        Ok(body.into_bytes().to_vec())
    }

    #[instrument(skip(self))]
    async fn copy(
        &self,
        bucket: &str,
        source_key: &str,
        destination_key: &str,
    ) -> Result<(), StorageError> {
        self.inner
            .copy_object()
            .bucket(bucket)
            .copy_source(copy_source(bucket, source_key))
            .key(destination_key)
            .send()
            .await
            .map_err(|error| {
                request_error("copy_object", bucket, source_key, DisplayErrorContext(&error))
            })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.inner.delete_object().bucket(bucket).key(key).send().await.map_err(|error| {
            request_error("delete_object", bucket, key, DisplayErrorContext(&error))
        })?;

        Ok(())
    }
}

/// `CopySource` must be URL-encoded; path separators are kept as-is.
fn copy_source(bucket: &str, key: &str) -> String {
    let encoded_key = key.split('/').map(urlencoding::encode).collect::<Vec<_>>().join("/");
    format!("{bucket}/{encoded_key}")
}

fn request_error(
    operation: &'static str,
    bucket: &str,
    key: &str,
    reason: impl std::fmt::Display,
) -> StorageError {
    StorageError::Request {
        operation,
        bucket: bucket.to_owned(),
        key: key.to_owned(),
        reason: reason.to_string(),
    }
}
