//! End-to-end tests for the gateway HTTP surface over the in-memory store.

mod common;

use common::{BUCKET, ORIGIN, TestGateway, payload};
use reqwest::{StatusCode, header};
use std::collections::HashSet;
use upload_gateway::services::object_store::ObjectStore;

#[tokio::test]
async fn landing_page_is_served() {
    let gw = TestGateway::start().await;
    let response = gw.client.get(gw.url("/")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html")
    );
    assert!(response.text().await.unwrap().contains("Upload Gateway"));
}

#[tokio::test]
async fn upload_url_names_key_after_timestamp_and_filename() {
    let gw = TestGateway::start().await;
    let (status, body) = gw
        .get_json("/upload-url?filename=a.txt&contentType=text/plain")
        .await;

    assert_eq!(status, StatusCode::OK);
    let url = body["uploadUrl"].as_str().unwrap();
    let prefix = format!("memory://{}/uploads/", BUCKET);
    let rest = url.strip_prefix(&prefix).expect("key under uploads/");
    let (key_tail, query) = rest.split_once('?').unwrap();
    let (millis, name) = key_tail.split_once('-').unwrap();
    assert!(millis.parse::<i64>().is_ok(), "timestamp prefix in {url}");
    assert_eq!(name, "a.txt");
    assert!(query.contains("X-Amz-Method=PUT"));
    assert!(query.contains("X-Amz-Expires=120"));
}

#[tokio::test]
async fn upload_url_requires_filename() {
    let gw = TestGateway::start().await;
    let response = gw
        .client
        .get(gw.url("/upload-url?contentType=text/plain"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn download_url_is_signed_for_requested_key() {
    let gw = TestGateway::start().await;
    let (status, body) = gw
        .get_json("/download-url?filename=uploads/1-a.txt")
        .await;

    assert_eq!(status, StatusCode::OK);
    let url = body["downloadUrl"].as_str().unwrap();
    assert!(url.starts_with(&format!("memory://{}/uploads/1-a.txt?", BUCKET)));
    assert!(url.contains("X-Amz-Method=GET"));
    assert!(url.contains("X-Amz-Expires=120"));
}

#[tokio::test]
async fn empty_bucket_lists_with_explicit_message() {
    let gw = TestGateway::start().await;
    let (status, body) = gw.get_json("/list").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "The bucket is empty");
    assert_eq!(body["objects"], serde_json::json!([]));
}

#[tokio::test]
async fn listing_a_missing_bucket_is_404() {
    let gw = TestGateway::without_bucket().await;
    let (status, body) = gw.get_json("/list").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Bucket not found");
    assert!(body["details"].as_str().unwrap().contains(BUCKET));
}

#[tokio::test]
async fn upload_list_download_round_trip() {
    let gw = TestGateway::start().await;
    let key = gw.upload_ok("a.txt", "text/plain", b"hello".to_vec()).await;
    assert!(key.starts_with("uploads/") && key.ends_with("-a.txt"), "{key}");

    let (status, body) = gw.get_json("/list").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.get("message").is_none());
    let objects = body["objects"].as_array().unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0]["key"], key.as_str());
    assert_eq!(objects[0]["size"], 5);
    assert!(objects[0]["lastModified"].is_string());

    let response = gw
        .client
        .get(gw.url("/download"))
        .query(&[("filename", key.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{}\"", key).as_str()
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"hello");
}

#[tokio::test]
async fn large_upload_streams_past_default_body_limit() {
    let gw = TestGateway::start().await;
    let data = payload(3 * 1024 * 1024 + 17);
    let key = gw
        .upload_ok("big.bin", "application/octet-stream", data.clone())
        .await;

    let response = gw
        .client
        .get(gw.url("/download"))
        .query(&[("filename", key.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH],
        data.len().to_string().as_str()
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), data.as_slice());
}

#[tokio::test]
async fn downloading_a_missing_object_is_an_error() {
    let gw = TestGateway::start().await;
    let response = gw
        .client
        .get(gw.url("/download?filename=uploads/nope.txt"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Object not found");
}

#[tokio::test]
async fn concurrent_uploads_get_distinct_keys() {
    let gw = TestGateway::start().await;
    let uploads = (0..8).map(|i| {
        let gw = &gw;
        async move {
            gw.upload_ok(&format!("file-{i}.txt"), "text/plain", payload(1024 + i))
                .await
        }
    });
    let keys: Vec<String> = futures::future::join_all(uploads).await;

    let distinct: HashSet<_> = keys.iter().collect();
    assert_eq!(distinct.len(), keys.len());

    let (_, body) = gw.get_json("/list").await;
    assert_eq!(body["objects"].as_array().unwrap().len(), keys.len());
}

#[tokio::test]
async fn non_file_fields_are_skipped() {
    let gw = TestGateway::start().await;
    let form = reqwest::multipart::Form::new()
        .text("note", "ignored")
        .part(
            "file",
            reqwest::multipart::Part::bytes(b"data".to_vec())
                .file_name("b.txt")
                .mime_str("text/plain")
                .unwrap(),
        );
    let response = gw
        .client
        .post(gw.url("/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["key"].as_str().unwrap().ends_with("-b.txt"));
}

#[tokio::test]
async fn directory_parts_of_uploaded_filename_are_dropped() {
    let gw = TestGateway::start().await;

    for filename in ["dir/sub/a.txt", "../../etc/a.txt"] {
        let form = reqwest::multipart::Form::new()
            .percent_encode_noop()
            .part(
                "file",
                reqwest::multipart::Part::bytes(b"data".to_vec())
                    .file_name(filename)
                    .mime_str("text/plain")
                    .unwrap(),
            );
        let response = gw
            .client
            .post(gw.url("/upload"))
            .multipart(form)
            .send()
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        let key = body["key"].as_str().unwrap();
        let tail = key.strip_prefix("uploads/").unwrap();
        assert!(!tail.contains('/'), "{filename} stored as {key}");
        assert!(tail.ends_with("-a.txt"), "{filename} stored as {key}");
    }
}

#[tokio::test]
async fn form_without_file_part_is_rejected() {
    let gw = TestGateway::start().await;
    let form = reqwest::multipart::Form::new().text("note", "no file here");
    let response = gw
        .client
        .post(gw.url("/upload"))
        .multipart(form)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let (_, body) = gw.get_json("/list").await;
    assert_eq!(body["objects"], serde_json::json!([]));
}

#[tokio::test]
async fn truncated_multipart_body_fails_without_partial_object() {
    let gw = TestGateway::start().await;
    // Part headers and some data, but the closing boundary never arrives.
    let body = concat!(
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"file\"; filename=\"a.txt\"\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "hello wor"
    );
    let response = gw
        .client
        .post(gw.url("/upload"))
        .header(
            header::CONTENT_TYPE,
            "multipart/form-data; boundary=XBOUNDARY",
        )
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let error: serde_json::Value = response.json().await.unwrap();
    assert_eq!(error["error"], "Upload failed");

    let (_, listing) = gw.get_json("/list").await;
    assert_eq!(listing["objects"], serde_json::json!([]));
    assert!(gw.store.list_objects(BUCKET).await.unwrap().is_empty());
}

#[tokio::test]
async fn readiness_tracks_bucket_presence() {
    let ready = TestGateway::start().await;
    let (status, body) = ready.get_json("/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bucket"], BUCKET);

    let missing = TestGateway::without_bucket().await;
    let (status, body) = missing.get_json("/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");

    let (status, _) = missing.get_json("/healthz").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let gw = TestGateway::start().await;
    let response = gw
        .client
        .request(reqwest::Method::OPTIONS, gw.url("/upload"))
        .header(header::ORIGIN, ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        ORIGIN
    );
}
