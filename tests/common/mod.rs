//! Shared test infrastructure for integration tests
//!
//! Runs the real gateway router on an ephemeral port over an in-memory store.

#![allow(dead_code)]

use std::sync::Arc;
use tokio::{net::TcpListener, task::JoinHandle};
use upload_gateway::{
    models::cors::CorsPolicy,
    routes::routes,
    services::{memory_store::MemoryStore, storage_service::StorageService},
};

pub const BUCKET: &str = "gateway-test";
pub const ORIGIN: &str = "http://localhost:3000";

pub struct TestGateway {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub client: reqwest::Client,
    server: JoinHandle<()>,
}

impl TestGateway {
    /// Gateway whose bucket has been provisioned, as after a normal startup.
    pub async fn start() -> Self {
        Self::spawn(true).await
    }

    /// Gateway whose bucket was never created.
    pub async fn without_bucket() -> Self {
        Self::spawn(false).await
    }

    async fn spawn(provision: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let service = StorageService::new(store.clone(), BUCKET, CorsPolicy::for_origin(ORIGIN));
        if provision {
            service.provision().await.expect("provisioning in-memory bucket");
        }

        let app = routes::app(service).expect("building router");
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("binding ephemeral port");
        let addr = listener.local_addr().expect("reading local addr");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server crashed");
        });

        Self {
            base_url: format!("http://{}", addr),
            store,
            client: reqwest::Client::new(),
            server,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST `data` as a single file part and return the raw response.
    pub async fn upload(&self, filename: &str, content_type: &str, data: Vec<u8>) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .expect("valid mime");
        let form = reqwest::multipart::Form::new().part("file", part);
        self.client
            .post(self.url("/upload"))
            .multipart(form)
            .send()
            .await
            .expect("upload request")
    }

    /// Upload and return the stored key, asserting success.
    pub async fn upload_ok(&self, filename: &str, content_type: &str, data: Vec<u8>) -> String {
        let response = self.upload(filename, content_type, data).await;
        assert_eq!(response.status(), 200, "upload of {} failed", filename);
        let body: serde_json::Value = response.json().await.expect("upload json");
        assert_eq!(body["message"], "File uploaded successfully");
        body["key"].as_str().expect("key in response").to_string()
    }

    pub async fn get_json(&self, path: &str) -> (reqwest::StatusCode, serde_json::Value) {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request");
        let status = response.status();
        (status, response.json().await.expect("json body"))
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Deterministic pseudo-random payload of `len` bytes.
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}
