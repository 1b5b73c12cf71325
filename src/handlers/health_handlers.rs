//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that probes the configured bucket

use crate::services::storage_service::StorageService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// 200 when the bucket exists, 503 when it is missing or the probe fails.
pub async fn readyz(State(service): State<StorageService>) -> impl IntoResponse {
    let (ok, error) = match service.bucket_ready().await {
        Ok(true) => (true, None),
        Ok(false) => (false, Some(format!("bucket `{}` does not exist", service.bucket))),
        Err(e) => (false, Some(e.to_string())),
    };

    let body = ReadyResponse {
        status: if ok { "ok".into() } else { "error".into() },
        bucket: service.bucket.to_string(),
        error,
    };

    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}
