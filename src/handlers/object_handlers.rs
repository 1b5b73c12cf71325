//! HTTP handlers for listing, proxied upload, and proxied download.
//! Object bodies are streamed in both directions; nothing here buffers a
//! whole file in memory.

use super::presign_handlers::FilenameQuery;
use crate::{
    errors::AppError,
    models::responses::{ListResponse, UploadResponse},
    services::{
        object_store::{ByteChunks, ObjectDownload, StorageError},
        storage_service::StorageService,
    },
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Query, State, multipart::Field},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use futures::StreamExt;
use std::io;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Chunks allowed in flight between the multipart parser and the store.
const UPLOAD_CHANNEL_CAPACITY: usize = 8;

/// `GET /list`
pub async fn list_objects(
    State(service): State<StorageService>,
) -> Result<Json<ListResponse>, AppError> {
    let objects = service.list_objects().await?;
    debug!("listed {} objects", objects.len());
    Ok(Json(ListResponse::from_objects(objects)))
}

/// `POST /upload` — multipart form; the first file part is stored.
///
/// Other form fields are skipped. The file part is piped through a bounded
/// channel into the store, so the parser only reads as fast as storage
/// accepts. Parser and upload run inside this request future: if the client
/// disconnects both are dropped before the upload is committed.
pub async fn upload_file(
    State(service): State<StorageService>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::from(StorageError::Stream(err.body_text())))?
    {
        let Some(filename) = field.file_name().map(|name| base_name(name).to_owned()) else {
            debug!("skipping non-file form field {:?}", field.name());
            continue;
        };
        let content_type = field.content_type().map(str::to_owned);

        let (tx, rx) = mpsc::channel(UPLOAD_CHANNEL_CAPACITY);
        let ((), stored) = tokio::join!(
            forward_field(field, tx),
            service.upload_stream(&filename, content_type.as_deref(), channel_stream(rx)),
        );

        let key = stored.inspect_err(|err| warn!("upload of {} failed: {}", filename, err))?;
        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".into(),
            key,
        }));
    }

    Err(AppError::bad_request("No file part in multipart body"))
}

/// `GET /download?filename=` — stream the object as an attachment.
///
/// A missing object is reported before any header is sent. Once streaming
/// has begun a storage failure aborts the connection.
pub async fn download_file(
    State(service): State<StorageService>,
    Query(q): Query<FilenameQuery>,
) -> Result<Response, AppError> {
    let download = service.download(&q.filename).await?;

    let mut headers = HeaderMap::new();
    set_download_headers(&mut headers, &download, &q.filename);

    let mut response = Response::new(Body::from_stream(download.body));
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Feed multipart chunks into `tx` until the part ends, the parser fails,
/// or the receiving side goes away.
async fn forward_field(mut field: Field<'_>, tx: mpsc::Sender<io::Result<Bytes>>) {
    loop {
        match field.chunk().await {
            Ok(Some(chunk)) => {
                if tx.send(Ok(chunk)).await.is_err() {
                    // Store stopped reading; its error is reported instead.
                    return;
                }
            }
            Ok(None) => return,
            Err(err) => {
                let _ = tx.send(Err(io::Error::other(err.body_text()))).await;
                return;
            }
        }
    }
}

/// Last path segment of a client-supplied filename. Directory parts, from
/// either separator style, never reach the object key.
fn base_name(name: &str) -> &str {
    let last = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    match last {
        "." | ".." => "",
        _ => last,
    }
}

fn channel_stream(rx: mpsc::Receiver<io::Result<Bytes>>) -> ByteChunks {
    futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    })
    .boxed()
}

fn set_download_headers(headers: &mut HeaderMap, download: &ObjectDownload, filename: &str) {
    let content_type = download
        .content_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    if let Some(length) = download.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );
}
