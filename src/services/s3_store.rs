//! `ObjectStore` backed by an S3-compatible service through the AWS SDK.
//!
//! The client is configured directly with static credentials and path-style
//! addressing so self-hosted providers (MinIO, Ceph, ...) work with a plain
//! endpoint URL.

use super::object_store::{
    ByteChunks, ObjectDownload, ObjectStore, StorageError, StorageResult,
};
use crate::{
    config::S3Settings,
    models::{cors::CorsPolicy, object::ObjectSummary},
};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Region},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    presigning::PresigningConfig,
    primitives::ByteStream,
    types::{
        BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CorsConfiguration,
        CorsRule, CreateBucketConfiguration,
    },
};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::{io, time::Duration};
use tracing::{debug, warn};

/// Size of each multipart part. Also the most the store buffers per upload.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// Region that must not be sent as an explicit location constraint.
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    region: String,
}

impl S3Store {
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "upload-gateway-config",
        );

        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .credentials_provider(credentials)
            .force_path_style(true);

        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        debug!(
            "S3 client configured for region {} (endpoint: {:?})",
            settings.region, settings.endpoint
        );

        Self {
            client: Client::from_conf(builder.build()),
            region: settings.region.clone(),
        }
    }

    fn presigning_config(
        method: &'static str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<PresigningConfig> {
        PresigningConfig::expires_in(expires_in).map_err(|err| StorageError::Signing {
            method,
            key: key.to_string(),
            reason: err.to_string(),
        })
    }

    async fn put_single(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        data: Bytes,
    ) -> StorageResult<u64> {
        let size = data.len() as u64;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_owned))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify(bucket, "put_object", e))?;
        debug!("S3 PUT {}/{} ({} bytes)", bucket, key, size);
        Ok(size)
    }

    /// Upload `buffer` plus the rest of `body` as parts of `upload_id`, then
    /// complete the upload. The caller aborts on error.
    async fn upload_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        mut body: ByteChunks,
        mut buffer: BytesMut,
    ) -> StorageResult<u64> {
        let mut parts = Vec::new();
        let mut total: u64 = 0;
        let mut ended = false;

        loop {
            while buffer.len() >= PART_SIZE {
                let part = buffer.split_to(PART_SIZE).freeze();
                total += part.len() as u64;
                let number = parts.len() as i32 + 1;
                parts.push(self.upload_part(bucket, key, upload_id, number, part).await?);
            }
            if ended {
                break;
            }
            ended = fill_part(&mut body, &mut buffer).await?;
        }

        if !buffer.is_empty() {
            let part = buffer.freeze();
            total += part.len() as u64;
            let number = parts.len() as i32 + 1;
            parts.push(self.upload_part(bucket, key, upload_id, number, part).await?);
        }

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify(bucket, "complete_multipart_upload", e))?;

        Ok(total)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Bytes,
    ) -> StorageResult<CompletedPart> {
        let size = data.len();
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify(bucket, "upload_part", e))?;
        debug!(
            "S3 part {} of {}/{} uploaded ({} bytes)",
            part_number, bucket, key, size
        );

        Ok(CompletedPart::builder()
            .set_e_tag(output.e_tag)
            .part_number(part_number)
            .build())
    }

    async fn abort_upload(&self, bucket: &str, key: &str, upload_id: &str) {
        match self
            .client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            Ok(_) => debug!("aborted multipart upload {} for {}/{}", upload_id, bucket, key),
            Err(err) => warn!(
                "failed to abort multipart upload {} for {}/{}: {}",
                upload_id,
                bucket,
                key,
                DisplayErrorContext(&err)
            ),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err))
                if err.err().is_not_found() || err.raw().status().as_u16() == 404 =>
            {
                Ok(false)
            }
            Err(err) => Err(StorageError::backend(
                "head_bucket",
                DisplayErrorContext(&err),
            )),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(()),
            // Lost a race with another gateway instance; the bucket is ours either way.
            Err(SdkError::ServiceError(err)) if err.err().is_bucket_already_owned_by_you() => {
                Ok(())
            }
            Err(err) => Err(StorageError::backend(
                "create_bucket",
                DisplayErrorContext(&err),
            )),
        }
    }

    async fn put_bucket_cors(&self, bucket: &str, policy: &CorsPolicy) -> StorageResult<()> {
        let rule = CorsRule::builder()
            .set_allowed_headers(Some(policy.allowed_headers.clone()))
            .set_allowed_methods(Some(policy.allowed_methods.clone()))
            .set_allowed_origins(Some(policy.allowed_origins.clone()))
            .set_expose_headers(Some(Vec::new()))
            .max_age_seconds(policy.max_age_seconds)
            .build()
            .map_err(|e| StorageError::backend("put_bucket_cors", e))?;
        let configuration = CorsConfiguration::builder()
            .cors_rules(rule)
            .build()
            .map_err(|e| StorageError::backend("put_bucket_cors", e))?;

        self.client
            .put_bucket_cors()
            .bucket(bucket)
            .cors_configuration(configuration)
            .send()
            .await
            .map_err(|e| classify(bucket, "put_bucket_cors", e))?;
        Ok(())
    }

    async fn presign_put(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let config = Self::presigning_config("PUT", key, expires_in)?;
        let request = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_owned))
            .presigned(config)
            .await
            .map_err(|err| StorageError::Signing {
                method: "PUT",
                key: key.to_string(),
                reason: DisplayErrorContext(&err).to_string(),
            })?;
        Ok(request.uri().to_string())
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let config = Self::presigning_config("GET", key, expires_in)?;
        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|err| StorageError::Signing {
                method: "GET",
                key: key.to_string(),
                reason: DisplayErrorContext(&err).to_string(),
            })?;
        Ok(request.uri().to_string())
    }

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| match &e {
                    SdkError::ServiceError(svc)
                        if svc.err().is_no_such_bucket() || svc.raw().status().as_u16() == 404 =>
                    {
                        StorageError::BucketNotFound(bucket.to_string())
                    }
                    _ => StorageError::backend("list_objects_v2", DisplayErrorContext(&e)),
                })?;

            for object in response.contents.unwrap_or_default() {
                let Some(key) = object.key else { continue };
                objects.push(ObjectSummary {
                    key,
                    size: object.size.unwrap_or(0).max(0) as u64,
                    last_modified: object
                        .last_modified
                        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.secs(), dt.subsec_nanos())),
                });
            }

            if response.is_truncated.unwrap_or(false) && response.next_continuation_token.is_some()
            {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        debug!("S3 LIST {} ({} objects)", bucket, objects.len());
        Ok(objects)
    }

    async fn put_stream(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        mut body: ByteChunks,
    ) -> StorageResult<u64> {
        let mut buffer = BytesMut::with_capacity(PART_SIZE);
        if fill_part(&mut body, &mut buffer).await? {
            // Fits in one part: a single PUT, nothing to abort.
            return self
                .put_single(bucket, key, content_type, buffer.freeze())
                .await;
        }

        let created = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .set_content_type(content_type.map(str::to_owned))
            .send()
            .await
            .map_err(|e| classify(bucket, "create_multipart_upload", e))?;
        let upload_id = created.upload_id.ok_or_else(|| {
            StorageError::backend("create_multipart_upload", "response carried no upload id")
        })?;

        match self.upload_parts(bucket, key, &upload_id, body, buffer).await {
            Ok(size) => {
                debug!("S3 multipart PUT {}/{} ({} bytes)", bucket, key, size);
                Ok(size)
            }
            Err(err) => {
                warn!("multipart upload of {}/{} failed: {}", bucket, key, err);
                self.abort_upload(bucket, key, &upload_id).await;
                Err(err)
            }
        }
    }

    async fn get_stream(&self, bucket: &str, key: &str) -> StorageResult<ObjectDownload> {
        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| match &e {
                SdkError::ServiceError(svc)
                    if svc.err().is_no_such_key() || svc.raw().status().as_u16() == 404 =>
                {
                    StorageError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                }
                _ => StorageError::backend("get_object", DisplayErrorContext(&e)),
            })?;

        debug!("S3 GET stream {}/{}", bucket, key);

        // Chunks are pulled from the provider only as fast as the client reads.
        let body = futures::stream::unfold(response.body, |mut body| async move {
            match body.try_next().await {
                Ok(Some(chunk)) => Some((Ok(chunk), body)),
                Ok(None) => None,
                Err(err) => Some((Err(io::Error::other(err)), body)),
            }
        })
        .boxed();

        Ok(ObjectDownload {
            content_type: response.content_type,
            content_length: response
                .content_length
                .and_then(|len| u64::try_from(len).ok()),
            body,
        })
    }
}

/// Read from `body` into `buffer` until it holds at least one part or the
/// stream ends. Returns `true` once the stream is exhausted.
async fn fill_part(body: &mut ByteChunks, buffer: &mut BytesMut) -> StorageResult<bool> {
    while buffer.len() < PART_SIZE {
        match body.next().await {
            Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
            Some(Err(err)) => return Err(StorageError::Stream(err.to_string())),
            None => return Ok(true),
        }
    }
    Ok(false)
}

/// Map an SDK error to `BucketNotFound` when the provider says so, otherwise
/// to a backend failure of `operation`.
fn classify<E>(bucket: &str, operation: &'static str, err: SdkError<E>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    if let SdkError::ServiceError(svc) = &err {
        if svc.err().code() == Some("NoSuchBucket") {
            return StorageError::BucketNotFound(bucket.to_string());
        }
    }
    StorageError::backend(operation, DisplayErrorContext(&err))
}
