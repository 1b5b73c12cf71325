//! Storage seam between the HTTP gateway and the object-storage provider.
//!
//! `ObjectStore` is the only surface handlers reach through. The production
//! implementation is [`S3Store`](super::s3_store::S3Store); an in-memory
//! [`MemoryStore`](super::memory_store::MemoryStore) backs local demos and tests.

use crate::models::{cors::CorsPolicy, object::ObjectSummary};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::{io, time::Duration};
use thiserror::Error;

/// Lifetime of every presigned URL issued by the gateway.
pub const PRESIGN_EXPIRY: Duration = Duration::from_secs(120);

/// A body flowing into or out of the store, one chunk at a time.
pub type ByteChunks = BoxStream<'static, io::Result<Bytes>>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("could not presign {method} for `{key}`: {reason}")]
    Signing {
        method: &'static str,
        key: String,
        reason: String,
    },
    #[error("upload stream failed: {0}")]
    Stream(String),
    #[error("{operation} failed: {reason}")]
    Backend {
        operation: &'static str,
        reason: String,
    },
}

impl StorageError {
    pub fn backend(operation: &'static str, reason: impl ToString) -> Self {
        Self::Backend {
            operation,
            reason: reason.to_string(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// An object body ready to be streamed back to a client.
pub struct ObjectDownload {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: ByteChunks,
}

impl std::fmt::Debug for ObjectDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectDownload")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Operations the gateway needs from an object-storage provider.
///
/// Implementations must be safe to share across concurrent requests; none of
/// these methods mutate client configuration.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Metadata probe. `Ok(false)` only when the provider says "not found".
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Replace the bucket CORS configuration with `policy`.
    async fn put_bucket_cors(&self, bucket: &str, policy: &CorsPolicy) -> StorageResult<()>;

    /// Presigned PUT URL valid for `expires_in`. Does not create the object.
    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Presigned GET URL valid for `expires_in`. Does not probe the key.
    async fn presign_get(&self, bucket: &str, key: &str, expires_in: Duration)
    -> StorageResult<String>;

    /// Every object in the bucket, in provider order.
    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectSummary>>;

    /// Stream `body` into `key`, returning the number of bytes stored.
    ///
    /// The object becomes visible only if the whole stream was consumed
    /// without error; on failure nothing is committed.
    async fn put_stream(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        body: ByteChunks,
    ) -> StorageResult<u64>;

    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ObjectDownload>;
}
