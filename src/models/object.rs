//! Represents an object (file) stored in the gateway bucket.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Listing entry for a single stored object.
///
/// Only the fields surfaced by `GET /list` are kept; the gateway tracks no
/// additional metadata of its own.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ObjectSummary {
    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Size in bytes.
    pub size: u64,

    /// Timestamp when the object was last written, if the provider reports it.
    pub last_modified: Option<DateTime<Utc>>,
}
