//! End-to-end API flow tests
//!
//! Drives the full presign -> upload -> register -> poll flow through the
//! in-process router.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use recbatch_ingest::{build_router, AppState, BlobStore, ServiceConfig};

const TEST_KEY: &str = "test_12345";

async fn test_app() -> (TempDir, sqlx::SqlitePool, Router) {
    let pool = sqlx::SqlitePool::connect(":memory:").await.unwrap();
    recbatch_ingest::db::init_tables(&pool).await.unwrap();

    let dir = TempDir::new().unwrap();
    let store = BlobStore::new(dir.path().join("storage"));
    store.ensure_directory_exists().unwrap();

    let config = ServiceConfig {
        root_folder: dir.path().to_path_buf(),
        api_key: TEST_KEY.to_string(),
        port: 5741,
        presign_ttl_seconds: 600,
    };

    let app = build_router(AppState::new(pool.clone(), store, config));
    (dir, pool, app)
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

fn presign_request(batch_id: Option<&str>, files: &[(&str, &str)]) -> Request<Body> {
    let items: Vec<Value> = files
        .iter()
        .map(|(name, ct)| json!({"filename": name, "contentType": ct}))
        .collect();
    let mut body = json!({ "items": items });
    if let Some(id) = batch_id {
        body["batch_id"] = json!(id);
    }
    Request::builder()
        .method("POST")
        .uri("/uploads/presign")
        .header("host", "localhost:5741")
        .header("x-api-key", TEST_KEY)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn token_from_url(upload_url: &str) -> String {
    upload_url.split("token=").nth(1).unwrap().to_string()
}

fn put_request(upload_id: &str, token: &str, content_type: &str, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(format!("/uploads/{}?token={}", upload_id, token))
        .header("content-type", content_type)
        .body(Body::from(bytes.to_vec()))
        .unwrap()
}

fn register_request(batch_id: &str, items: Vec<Value>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/recordings")
        .header("x-api-key", TEST_KEY)
        .header("content-type", "application/json")
        .body(Body::from(json!({"batch_id": batch_id, "items": items}).to_string()))
        .unwrap()
}

fn poll_request(batch_id: &str) -> Request<Body> {
    Request::builder()
        .uri(format!("/batches/{}", batch_id))
        .header("x-api-key", TEST_KEY)
        .body(Body::empty())
        .unwrap()
}

fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}

#[tokio::test]
async fn full_flow_two_uploads_to_complete_batch() {
    let (_dir, _pool, app) = test_app().await;

    // Presign two slots under a fresh batch
    let (status, presign) = send(
        &app,
        presign_request(None, &[("call1.wav", "audio/wav"), ("call2.mp3", "audio/mpeg")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let batch_id = presign["batch_id"].as_str().unwrap().to_string();
    assert!(batch_id.starts_with("rb_"));
    assert_eq!(presign["expires_in_seconds"], 600);
    let items = presign["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["method"], "PUT");
    assert_eq!(items[0]["required_headers"]["Content-Type"], "audio/wav");

    // Upload both
    let mut blob_refs = Vec::new();
    for (item, (ct, bytes)) in items
        .iter()
        .zip([
            ("audio/wav", b"wav audio bytes".as_slice()),
            ("audio/mpeg", b"mp3 audio bytes".as_slice()),
        ])
    {
        let upload_id = item["upload_id"].as_str().unwrap();
        let token = token_from_url(item["upload_url"].as_str().unwrap());
        let (status, body) = send(&app, put_request(upload_id, &token, ct, bytes)).await;
        assert_eq!(status, StatusCode::CREATED);
        blob_refs.push(body["blob_ref"].as_str().unwrap().to_string());
    }

    // Register recordings referencing both refs
    let meta1 = json!({"agentId": "007", "locale": "en-US"});
    let meta2 = json!({"agentId": "008", "locale": "de-DE", "tags": ["b2b"]});
    let (status, registered) = send(
        &app,
        register_request(
            &batch_id,
            vec![
                json!({"blob_ref": blob_refs[0], "metadata": meta1}),
                json!({"blob_ref": blob_refs[1], "metadata": meta2}),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(registered["status"], "complete");
    assert_eq!(registered["items"].as_array().unwrap().len(), 2);
    assert_eq!(
        registered["poll"]["href"],
        format!("/batches/{}", batch_id)
    );

    // Poll: complete, two recordings, metadata round-tripped verbatim
    let (status, polled) = send(&app, poll_request(&batch_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(polled["status"], "complete");
    let recordings = polled["recordings"].as_array().unwrap();
    assert_eq!(recordings.len(), 2);
    assert_eq!(recordings[0]["metadata"], meta1);
    assert_eq!(recordings[1]["metadata"], meta2);
    assert_eq!(recordings[0]["blob_ref"], blob_refs[0].as_str());
    assert_eq!(recordings[0]["content_type"], "audio/wav");

    // Media streams the stored bytes with the declared type
    let recording_id = recordings[0]["recording_id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/media/{}?key={}", recording_id, TEST_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "audio/wav"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"wav audio bytes");
}

#[tokio::test]
async fn expired_token_rejected_and_batch_stays_open() {
    let (_dir, pool, app) = test_app().await;

    let (_, presign) = send(&app, presign_request(None, &[("late.wav", "audio/wav")])).await;
    let batch_id = presign["batch_id"].as_str().unwrap().to_string();
    let item = &presign["items"][0];
    let upload_id = item["upload_id"].as_str().unwrap();
    let token = token_from_url(item["upload_url"].as_str().unwrap());

    // Simulate clock advance past the validity window
    sqlx::query("UPDATE upload_slots SET expires_at = ? WHERE upload_id = ?")
        .bind((chrono::Utc::now() - chrono::Duration::minutes(1)).to_rfc3339())
        .bind(upload_id)
        .execute(&pool)
        .await
        .unwrap();

    let (status, body) = send(&app, put_request(upload_id, &token, "audio/wav", b"late")).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(error_code(&body), "TOKEN_EXPIRED");

    // Valid-looking retry stays rejected
    let (status, body) = send(&app, put_request(upload_id, &token, "audio/wav", b"late")).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(error_code(&body), "TOKEN_EXPIRED");

    let (status, polled) = send(&app, poll_request(&batch_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(polled["status"], "open");
    assert!(polled["recordings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn content_type_mismatch_rejected() {
    let (_dir, _pool, app) = test_app().await;

    let (_, presign) = send(&app, presign_request(None, &[("call.wav", "audio/wav")])).await;
    let item = &presign["items"][0];
    let upload_id = item["upload_id"].as_str().unwrap();
    let token = token_from_url(item["upload_url"].as_str().unwrap());

    let (status, body) =
        send(&app, put_request(upload_id, &token, "audio/mpeg", b"bytes")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "CONTENT_TYPE_MISMATCH");
}

#[tokio::test]
async fn api_key_gates_everything_but_the_upload_put() {
    let (_dir, _pool, app) = test_app().await;

    // No key
    let request = Request::builder()
        .method("POST")
        .uri("/uploads/presign")
        .header("host", "localhost:5741")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({"items": [{"filename": "a.wav", "contentType": "audio/wav"}]}).to_string(),
        ))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "UNAUTHORIZED");

    // Wrong key
    let request = Request::builder()
        .uri("/batches/rb_whatever")
        .header("x-api-key", "wrong_key")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // The upload PUT is authorized by token possession alone: a bad token
    // yields a token error, not an auth error
    let (status, body) = send(&app, put_request("upl_x", "tok_x", "audio/wav", b"b")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_TOKEN");
}

#[tokio::test]
async fn unknown_batch_polls_404() {
    let (_dir, _pool, app) = test_app().await;
    let (status, body) = send(&app, poll_request("rb_missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "UNKNOWN_BATCH");
}

#[tokio::test]
async fn health_reports_module_identity() {
    let (_dir, _pool, app) = test_app().await;
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "recbatch-ingest");
}

#[tokio::test]
async fn ui_asks_for_key_then_renders_batches() {
    let (_dir, _pool, app) = test_app().await;

    // Without a key: the entry form
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/ui").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Wrong key: 401
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/ui?key=nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Right key: the page renders
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/ui?key={}", TEST_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/html"));
}
