//! Data models for the upload gateway.
//!
//! These are plain serde types: listing entries, the bucket CORS rule, and
//! the JSON response bodies of each endpoint.

pub mod cors;
pub mod object;
pub mod responses;
