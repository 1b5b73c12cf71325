//! In-memory `ObjectStore` for local demos and tests.
//!
//! Buckets live in a process-local map; nothing survives a restart. Uploads
//! are staged off to the side and only inserted once their stream completes,
//! matching the "no partial objects" contract of the S3 backend.

use super::object_store::{
    ByteChunks, ObjectDownload, ObjectStore, StorageError, StorageResult,
};
use crate::models::{cors::CorsPolicy, object::ObjectSummary};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};
use tokio::sync::RwLock;
use tracing::debug;

/// Chunk size used when streaming a stored object back out.
const READ_CHUNK: usize = 64 * 1024;

#[derive(Clone, Debug)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

#[derive(Default, Debug)]
struct MemoryBucket {
    objects: BTreeMap<String, StoredObject>,
    cors: Option<CorsPolicy>,
}

#[derive(Default)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, MemoryBucket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// CORS policy currently applied to `bucket`, if any.
    pub async fn bucket_cors(&self, bucket: &str) -> Option<CorsPolicy> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .and_then(|b| b.cors.clone())
    }

    fn presigned_url(method: &str, bucket: &str, key: &str, expires_in: Duration) -> String {
        format!(
            "memory://{}/{}?X-Amz-Method={}&X-Amz-Expires={}",
            bucket,
            key,
            method,
            expires_in.as_secs()
        )
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        Ok(self.buckets.read().await.contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    async fn put_bucket_cors(&self, bucket: &str, policy: &CorsPolicy) -> StorageResult<()> {
        let mut buckets = self.buckets.write().await;
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        entry.cors = Some(policy.clone());
        Ok(())
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        _content_type: Option<&str>,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(Self::presigned_url("PUT", bucket, key, expires_in))
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(Self::presigned_url("GET", bucket, key, expires_in))
    }

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectSummary>> {
        let buckets = self.buckets.read().await;
        let entry = buckets
            .get(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        Ok(entry
            .objects
            .iter()
            .map(|(key, obj)| ObjectSummary {
                key: key.clone(),
                size: obj.data.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .collect())
    }

    async fn put_stream(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        mut body: ByteChunks,
    ) -> StorageResult<u64> {
        if !self.bucket_exists(bucket).await? {
            return Err(StorageError::BucketNotFound(bucket.to_string()));
        }

        let mut staged = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|err| StorageError::Stream(err.to_string()))?;
            staged.extend_from_slice(&chunk);
        }

        let size = staged.len() as u64;
        let mut buckets = self.buckets.write().await;
        let entry = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))?;
        entry.objects.insert(
            key.to_string(),
            StoredObject {
                data: staged.freeze(),
                content_type: content_type.map(str::to_owned),
                last_modified: Utc::now(),
            },
        );
        debug!("memory PUT {}/{} ({} bytes)", bucket, key, size);
        Ok(size)
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ObjectDownload> {
        let buckets = self.buckets.read().await;
        let object = buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .cloned()
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;

        let data = object.data;
        let chunks: Vec<Bytes> = (0..data.len())
            .step_by(READ_CHUNK)
            .map(|start| data.slice(start..(start + READ_CHUNK).min(data.len())))
            .collect();

        Ok(ObjectDownload {
            content_type: object.content_type,
            content_length: Some(data.len() as u64),
            body: futures::stream::iter(chunks.into_iter().map(Ok)).boxed(),
        })
    }
}
