//! HTTP gateway over S3-compatible object storage.
//!
//! Issues presigned upload/download URLs, proxies streaming uploads and
//! downloads, and lists the contents of a single bucket.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
