//! JSON bodies returned by the gateway endpoints.

use super::object::ObjectSummary;
use serde::Serialize;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub upload_url: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct DownloadUrlResponse {
    pub download_url: String,
}

/// Body of `GET /list`. An empty bucket carries an explicit `message`.
#[derive(Serialize, Debug)]
pub struct ListResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub objects: Vec<ObjectSummary>,
}

impl ListResponse {
    pub fn from_objects(objects: Vec<ObjectSummary>) -> Self {
        let message = objects
            .is_empty()
            .then(|| "The bucket is empty".to_string());
        Self { message, objects }
    }
}

#[derive(Serialize, Debug)]
pub struct UploadResponse {
    pub message: String,
    pub key: String,
}
