//! Batch and slot lifecycle tests
//!
//! Dedup, single-shot fulfillment, cross-batch linkage, atomic
//! registration, additive re-presign, finalization, and deletion.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use recbatch_ingest::{build_router, AppState, BlobStore, ServiceConfig};

const TEST_KEY: &str = "test_12345";

struct TestApp {
    _dir: TempDir,
    storage_dir: std::path::PathBuf,
    app: Router,
}

async fn test_app() -> TestApp {
    let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
    recbatch_ingest::db::init_tables(&pool).await.unwrap();

    let dir = TempDir::new().unwrap();
    let storage_dir = dir.path().join("storage");
    let store = BlobStore::new(&storage_dir);
    store.ensure_directory_exists().unwrap();

    let config = ServiceConfig {
        root_folder: dir.path().to_path_buf(),
        api_key: TEST_KEY.to_string(),
        port: 5741,
        presign_ttl_seconds: 600,
    };

    TestApp {
        app: build_router(AppState::new(pool, store, config)),
        storage_dir,
        _dir: dir,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn presign(app: &Router, batch_id: Option<&str>, files: &[(&str, &str)]) -> (StatusCode, Value) {
    let items: Vec<Value> = files
        .iter()
        .map(|(name, ct)| json!({"filename": name, "contentType": ct}))
        .collect();
    let mut body = json!({ "items": items });
    if let Some(id) = batch_id {
        body["batch_id"] = json!(id);
    }
    let request = Request::builder()
        .method("POST")
        .uri("/uploads/presign")
        .header("host", "localhost:5741")
        .header("x-api-key", TEST_KEY)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

/// Presign one slot and upload the given bytes; returns (batch_id, blob_ref)
async fn upload_into(app: &Router, batch_id: Option<&str>, bytes: &[u8]) -> (String, String) {
    let (status, presigned) = presign(app, batch_id, &[("clip.wav", "audio/wav")]).await;
    assert_eq!(status, StatusCode::OK);
    let batch_id = presigned["batch_id"].as_str().unwrap().to_string();
    let item = &presigned["items"][0];
    let upload_id = item["upload_id"].as_str().unwrap();
    let token = item["upload_url"]
        .as_str()
        .unwrap()
        .split("token=")
        .nth(1)
        .unwrap();

    let (status, uploaded) = send(
        app,
        Request::builder()
            .method("PUT")
            .uri(format!("/uploads/{}?token={}", upload_id, token))
            .header("content-type", "audio/wav")
            .body(Body::from(bytes.to_vec()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    (batch_id, uploaded["blob_ref"].as_str().unwrap().to_string())
}

async fn register(app: &Router, batch_id: &str, items: Vec<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/recordings")
        .header("x-api-key", TEST_KEY)
        .header("content-type", "application/json")
        .body(Body::from(json!({"batch_id": batch_id, "items": items}).to_string()))
        .unwrap();
    send(app, request).await
}

async fn poll(app: &Router, batch_id: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .uri(format!("/batches/{}", batch_id))
            .header("x-api-key", TEST_KEY)
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}

fn stored_file_count(storage_dir: &std::path::Path) -> usize {
    std::fs::read_dir(storage_dir).unwrap().count()
}

#[tokio::test]
async fn identical_bytes_in_two_slots_store_one_copy() {
    let rig = test_app().await;

    let (_, presigned) = presign(
        &rig.app,
        None,
        &[("a.wav", "audio/wav"), ("b.wav", "audio/wav")],
    )
    .await;
    let items = presigned["items"].as_array().unwrap();

    let mut refs = Vec::new();
    for item in items {
        let upload_id = item["upload_id"].as_str().unwrap();
        let token = item["upload_url"]
            .as_str()
            .unwrap()
            .split("token=")
            .nth(1)
            .unwrap();
        let (status, body) = send(
            &rig.app,
            Request::builder()
                .method("PUT")
                .uri(format!("/uploads/{}?token={}", upload_id, token))
                .header("content-type", "audio/wav")
                .body(Body::from(&b"identical audio content"[..]))
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        refs.push(body["blob_ref"].as_str().unwrap().to_string());
    }

    assert_eq!(refs[0], refs[1]);
    assert_eq!(stored_file_count(&rig.storage_dir), 1);
}

#[tokio::test]
async fn second_upload_against_fulfilled_slot_conflicts() {
    let rig = test_app().await;

    let (_, presigned) = presign(&rig.app, None, &[("a.wav", "audio/wav")]).await;
    let item = &presigned["items"][0];
    let upload_id = item["upload_id"].as_str().unwrap();
    let token = item["upload_url"]
        .as_str()
        .unwrap()
        .split("token=")
        .nth(1)
        .unwrap();

    let put = |bytes: &'static [u8]| {
        Request::builder()
            .method("PUT")
            .uri(format!("/uploads/{}?token={}", upload_id, token))
            .header("content-type", "audio/wav")
            .body(Body::from(bytes))
            .unwrap()
    };

    let (status, _) = send(&rig.app, put(b"first upload")).await;
    assert_eq!(status, StatusCode::CREATED);

    // Identical and differing content both conflict
    let (status, body) = send(&rig.app, put(b"first upload")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_FULFILLED");

    let (status, body) = send(&rig.app, put(b"different content")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "ALREADY_FULFILLED");
}

#[tokio::test]
async fn blob_fulfilled_under_one_batch_cannot_register_under_another() {
    let rig = test_app().await;

    let (batch_a, ref_a) = upload_into(&rig.app, None, b"batch a bytes").await;
    let (batch_b, _ref_b) = upload_into(&rig.app, None, b"batch b bytes").await;

    let (status, body) = register(
        &rig.app,
        &batch_b,
        vec![json!({"blob_ref": ref_a, "metadata": {}})],
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "BLOB_NOT_LINKED");

    // The same ref registers cleanly under its own batch
    let (status, body) = register(
        &rig.app,
        &batch_a,
        vec![json!({"blob_ref": ref_a, "metadata": {}})],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "complete");
}

#[tokio::test]
async fn one_invalid_item_registers_nothing() {
    let rig = test_app().await;

    let (batch_id, good_ref) = upload_into(&rig.app, None, b"good bytes").await;

    let (status, body) = register(
        &rig.app,
        &batch_id,
        vec![
            json!({"blob_ref": good_ref, "metadata": {"n": 1}}),
            json!({"blob_ref": "0000deadbeef", "metadata": {"n": 2}}),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "BLOB_NOT_FOUND");

    // Zero recordings were created
    let (_, polled) = poll(&rig.app, &batch_id).await;
    assert!(polled["recordings"].as_array().unwrap().is_empty());
    assert_eq!(polled["status"], "partially_fulfilled");

    // The good item still registers on its own
    let (status, _) = register(
        &rig.app,
        &batch_id,
        vec![json!({"blob_ref": good_ref, "metadata": {"n": 1}})],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn represign_appends_and_status_tracks_progress() {
    let rig = test_app().await;

    // One slot uploaded and recorded
    let (batch_id, first_ref) = upload_into(&rig.app, None, b"first clip").await;
    register(
        &rig.app,
        &batch_id,
        vec![json!({"blob_ref": first_ref, "metadata": {}})],
    )
    .await;
    let (_, polled) = poll(&rig.app, &batch_id).await;
    assert_eq!(polled["status"], "complete");

    // Appending a new slot reopens progress tracking
    // (complete batches are finalized, so this requires the batch to not
    // yet be complete; start from a two-slot batch instead)
    let (_, presigned) = presign(
        &rig.app,
        None,
        &[("a.wav", "audio/wav"), ("b.wav", "audio/wav")],
    )
    .await;
    let batch_id = presigned["batch_id"].as_str().unwrap().to_string();
    let (_, polled) = poll(&rig.app, &batch_id).await;
    assert_eq!(polled["status"], "open");

    // Fulfill one of two: partially fulfilled
    let item = &presigned["items"][0];
    let token = item["upload_url"]
        .as_str()
        .unwrap()
        .split("token=")
        .nth(1)
        .unwrap();
    send(
        &rig.app,
        Request::builder()
            .method("PUT")
            .uri(format!(
                "/uploads/{}?token={}",
                item["upload_id"].as_str().unwrap(),
                token
            ))
            .header("content-type", "audio/wav")
            .body(Body::from(&b"one of two"[..]))
            .unwrap(),
    )
    .await;
    let (_, polled) = poll(&rig.app, &batch_id).await;
    assert_eq!(polled["status"], "partially_fulfilled");

    // Additive re-presign against the same open batch
    let (status, appended) = presign(&rig.app, Some(&batch_id), &[("c.wav", "audio/wav")]).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(appended["batch_id"].as_str().unwrap(), batch_id);
}

#[tokio::test]
async fn complete_batch_rejects_further_presigns() {
    let rig = test_app().await;

    let (batch_id, blob_ref) = upload_into(&rig.app, None, b"the only clip").await;
    register(
        &rig.app,
        &batch_id,
        vec![json!({"blob_ref": blob_ref, "metadata": {}})],
    )
    .await;

    let (status, body) = presign(&rig.app, Some(&batch_id), &[("more.wav", "audio/wav")]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error_code(&body), "BATCH_FINALIZED");
}

#[tokio::test]
async fn presign_against_unknown_batch_404s() {
    let rig = test_app().await;
    let (status, body) = presign(&rig.app, Some("rb_missing"), &[("a.wav", "audio/wav")]).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "UNKNOWN_BATCH");
}

#[tokio::test]
async fn delete_batch_keeps_blobs_shared_with_others() {
    let rig = test_app().await;

    // The same bytes under two batches dedupe into one stored file
    let (batch_a, shared_ref) = upload_into(&rig.app, None, b"shared clip").await;
    let (batch_b, ref_b) = upload_into(&rig.app, None, b"shared clip").await;
    assert_eq!(shared_ref, ref_b);
    assert_eq!(stored_file_count(&rig.storage_dir), 1);

    let delete = |batch_id: String| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/batches/{}", batch_id))
            .header("x-api-key", TEST_KEY)
            .body(Body::empty())
            .unwrap()
    };

    let (status, _) = send(&rig.app, delete(batch_a.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Batch A is gone; the shared object survives for batch B
    let (status, _) = poll(&rig.app, &batch_a).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(stored_file_count(&rig.storage_dir), 1);

    let (status, _) = register(
        &rig.app,
        &batch_b,
        vec![json!({"blob_ref": shared_ref, "metadata": {}})],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Deleting the last referencing batch removes the file
    let (status, _) = send(&rig.app, delete(batch_b)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(stored_file_count(&rig.storage_dir), 0);
}
