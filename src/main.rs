use anyhow::Result;
use std::{io::ErrorKind, sync::Arc};
use tokio::{net::TcpListener, signal};
use tracing_subscriber::EnvFilter;
use upload_gateway::{
    config::{AppConfig, Backend},
    models::cors::CorsPolicy,
    routes::routes,
    services::{
        memory_store::MemoryStore,
        object_store::ObjectStore,
        s3_store::S3Store,
        storage_service::{ProvisionOutcome, StorageService},
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting upload-gateway with config: {:?}", cfg);

    // --- Initialize storage client ---
    let store: Arc<dyn ObjectStore> = match (&cfg.backend, &cfg.s3) {
        (Backend::S3, Some(settings)) => Arc::new(S3Store::new(settings)),
        (Backend::S3, None) => anyhow::bail!("s3 backend selected without S3 settings"),
        (Backend::Memory, _) => {
            tracing::warn!("Using in-memory storage; objects are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };
    let storage = StorageService::new(
        store,
        cfg.bucket.clone(),
        CorsPolicy::for_origin(cfg.cors_origin.clone()),
    );

    // --- Provision bucket before accepting traffic ---
    match storage.provision().await {
        Ok(ProvisionOutcome::Created) => tracing::info!("Bucket {} provisioned", cfg.bucket),
        Ok(ProvisionOutcome::AlreadyExisted) => {
            tracing::debug!("Bucket {} was already provisioned", cfg.bucket)
        }
        Err(err) if cfg.strict_provisioning => {
            return Err(anyhow::Error::new(err).context("bucket provisioning failed"));
        }
        Err(err) => {
            tracing::error!(
                "Bucket provisioning failed, serving anyway: {}",
                err
            );
        }
    }

    // --- Build router ---
    let app = routes::app(storage)?;

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server running at http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
