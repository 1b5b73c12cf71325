//! Presigned URL endpoints. Both are pure request/response: they authorize a
//! later direct client-to-storage transfer and touch no object themselves.

use crate::{
    errors::AppError,
    models::responses::{DownloadUrlResponse, UploadUrlResponse},
    services::storage_service::StorageService,
};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlQuery {
    pub filename: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FilenameQuery {
    /// Full object key, e.g. `uploads/1700000000000-a.txt`.
    pub filename: String,
}

/// `GET /upload-url?filename=&contentType=`
pub async fn upload_url(
    State(service): State<StorageService>,
    Query(q): Query<UploadUrlQuery>,
) -> Result<Json<UploadUrlResponse>, AppError> {
    let upload_url = service
        .issue_upload_url(&q.filename, q.content_type.as_deref())
        .await?;
    Ok(Json(UploadUrlResponse { upload_url }))
}

/// `GET /download-url?filename=`
///
/// Signing does not check that the key exists, so every failure here is a 500.
pub async fn download_url(
    State(service): State<StorageService>,
    Query(q): Query<FilenameQuery>,
) -> Result<Json<DownloadUrlResponse>, AppError> {
    let download_url = service
        .issue_download_url(&q.filename)
        .await
        .map_err(|err| AppError::internal("Could not generate signed URL").with_details(err.to_string()))?;
    Ok(Json(DownloadUrlResponse { download_url }))
}
