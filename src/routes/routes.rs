//! Defines routes for the upload gateway.
//!
//! ## Structure
//! - `GET  /`             — landing page
//! - `GET  /upload-url`   — presigned PUT URL (`filename`, `contentType`)
//! - `GET  /download-url` — presigned GET URL (`filename`)
//! - `GET  /list`         — list bucket contents
//! - `POST /upload`       — proxied multipart upload (streamed)
//! - `GET  /download`     — proxied download (streamed)
//! - `GET  /healthz`, `GET /readyz` — probes

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{download_file, list_objects, upload_file},
        page_handlers::index,
        presign_handlers::{download_url, upload_url},
    },
    models::cors::ALLOWED_METHODS,
    services::storage_service::StorageService,
};
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Build and return the router for all gateway routes.
///
/// The router carries shared state (`StorageService`) to all handlers.
pub fn routes() -> Router<StorageService> {
    Router::new()
        .route("/", get(index))
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // presigned URLs
        .route("/upload-url", get(upload_url))
        .route("/download-url", get(download_url))
        // proxied transfers
        .route("/list", get(list_objects))
        .route(
            "/upload",
            post(upload_file).layer(DefaultBodyLimit::disable()),
        )
        .route("/download", get(download_file))
}

/// Routes bound to `service`, with CORS and request tracing layered on.
pub fn app(service: StorageService) -> Result<Router> {
    let cors = cors_layer(service.cors.allowed_origins.first().map(String::as_str))?;
    Ok(routes()
        .with_state(service)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let methods = ALLOWED_METHODS
        .iter()
        .map(|m| Method::from_bytes(m.as_bytes()))
        .collect::<Result<Vec<_>, _>>()
        .context("parsing CORS methods")?;

    let layer = CorsLayer::new().allow_methods(methods).allow_headers(Any);
    Ok(match origin {
        None | Some("*") => layer.allow_origin(Any),
        Some(origin) => layer.allow_origin(
            HeaderValue::from_str(origin)
                .with_context(|| format!("invalid CORS origin `{}`", origin))?,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cors_layer_accepts_wildcard_and_concrete_origins() {
        assert!(cors_layer(Some("*")).is_ok());
        assert!(cors_layer(Some("http://localhost:3000")).is_ok());
        assert!(cors_layer(None).is_ok());
    }

    #[test]
    fn cors_layer_rejects_unprintable_origin() {
        assert!(cors_layer(Some("http://bad\norigin")).is_err());
    }
}
