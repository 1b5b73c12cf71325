//! src/services/storage_service.rs
//!
//! StorageService — the gateway operations on top of an `ObjectStore`:
//! bucket provisioning, presigned URL issuing, listing, and streaming
//! upload/download. Holds no per-request state; cloning is cheap.

use super::object_store::{
    ByteChunks, ObjectDownload, ObjectStore, PRESIGN_EXPIRY, StorageResult,
};
use crate::models::{cors::CorsPolicy, object::ObjectSummary};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Prefix under which every gateway upload is stored.
pub const UPLOAD_PREFIX: &str = "uploads/";

/// Build the storage key for an uploaded file: `uploads/<millis>-<filename>`.
///
/// Uniqueness is only as good as the millisecond timestamp; two uploads of
/// the same filename within one millisecond share a key (last write wins).
pub fn object_key(filename: &str, now_millis: i64) -> String {
    format!("{}{}-{}", UPLOAD_PREFIX, now_millis, filename)
}

/// What `provision` found on startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    Created,
    AlreadyExisted,
}

/// StorageService provides the gateway's storage operations:
/// - Provision the bucket (create if missing, apply CORS)
/// - Issue presigned upload / download URLs
/// - List objects
/// - Stream uploads into and downloads out of the bucket
#[derive(Clone)]
pub struct StorageService {
    /// Shared storage client, safe for concurrent use.
    pub store: Arc<dyn ObjectStore>,

    /// Bucket every operation targets.
    pub bucket: Arc<str>,

    /// CORS rule installed on the bucket during provisioning.
    pub cors: Arc<CorsPolicy>,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>, cors: CorsPolicy) -> Self {
        Self {
            store,
            bucket: Arc::from(bucket.into()),
            cors: Arc::new(cors),
        }
    }

    /// Ensure the bucket exists and (re)apply its CORS rule.
    ///
    /// Only a "not found" probe result leads to creation; any other probe
    /// failure is returned without creating anything.
    pub async fn provision(&self) -> StorageResult<ProvisionOutcome> {
        let outcome = if self.store.bucket_exists(&self.bucket).await? {
            info!("Bucket {} already exists", self.bucket);
            ProvisionOutcome::AlreadyExisted
        } else {
            self.store.create_bucket(&self.bucket).await?;
            info!("Bucket {} created successfully", self.bucket);
            ProvisionOutcome::Created
        };

        self.store.put_bucket_cors(&self.bucket, &self.cors).await?;
        info!(
            "CORS configuration applied to bucket {} (origins: {:?})",
            self.bucket, self.cors.allowed_origins
        );

        Ok(outcome)
    }

    /// Whether the bucket is currently reachable. Used by readiness probes.
    pub async fn bucket_ready(&self) -> StorageResult<bool> {
        self.store.bucket_exists(&self.bucket).await
    }

    /// Presign a PUT for a fresh key derived from `filename`.
    pub async fn issue_upload_url(
        &self,
        filename: &str,
        content_type: Option<&str>,
    ) -> StorageResult<String> {
        let key = object_key(filename, Utc::now().timestamp_millis());
        debug!("issuing upload url for {}", key);
        self.store
            .presign_put(&self.bucket, &key, content_type, PRESIGN_EXPIRY)
            .await
    }

    /// Presign a GET for `key`. The key is not probed for existence.
    pub async fn issue_download_url(&self, key: &str) -> StorageResult<String> {
        debug!("issuing download url for {}", key);
        self.store
            .presign_get(&self.bucket, key, PRESIGN_EXPIRY)
            .await
    }

    pub async fn list_objects(&self) -> StorageResult<Vec<ObjectSummary>> {
        self.store.list_objects(&self.bucket).await
    }

    /// Stream `body` into a new key derived from `filename` and return the key.
    pub async fn upload_stream(
        &self,
        filename: &str,
        content_type: Option<&str>,
        body: ByteChunks,
    ) -> StorageResult<String> {
        let key = object_key(filename, Utc::now().timestamp_millis());
        let size = self
            .store
            .put_stream(&self.bucket, &key, content_type, body)
            .await?;
        info!("stored {} ({} bytes)", key, size);
        Ok(key)
    }

    /// Open `key` for streaming. The raw key is passed straight to the store.
    pub async fn download(&self, key: &str) -> StorageResult<ObjectDownload> {
        self.store.get_stream(&self.bucket, key).await
    }
}
