//! HTTP routes of a served session.

use std::sync::Arc;

use ann_stream::builder::{BuildOptions, IndexBuilder};
use ann_stream::embedding::{EmbeddingProvider, TrigramProvider};
use ann_stream::query::{QueryHandle, QueryOptions};
use ann_stream::server::routes::create_router;
use ann_stream::server::AppState;
use ann_stream::session::StreamSessionAdapter;
use ann_stream::store::{Collection, Modality};
use ann_stream::Example;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

async fn app(dir: &TempDir, n: usize) -> Router {
    let examples = [
        "benchmarks for retrieval",
        "benchmarks on laptops",
        "a corpus of letters",
        "corpus statistics",
    ]
    .iter()
    .map(|t| Example::text(*t))
    .collect();
    let collection =
        Arc::new(Collection::from_examples("mem", examples, Modality::Text.normalizer()).unwrap());
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(TrigramProvider::new(128));
    let path = dir.path().join("server.index");
    IndexBuilder::new(provider.clone(), BuildOptions::default())
        .unwrap()
        .build(&collection)
        .await
        .unwrap()
        .persist(&path)
        .unwrap();

    let handle = QueryHandle::open(collection, &path, provider, QueryOptions::default())
        .await
        .unwrap();
    let adapter = Arc::new(StreamSessionAdapter::new(Arc::new(handle), n).unwrap());
    let controller = Arc::new(adapter.start("benchmarks").await.unwrap());
    create_router(Arc::new(AppState::new(controller, adapter)))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<Value>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&bytes).unwrap())
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn reset(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/events/stream-reset")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, 2).await;

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["examples"], 4);
    assert_eq!(body["query"], "benchmarks");
    assert_eq!(body["state"], "streaming");
}

#[tokio::test]
async fn test_next_until_exhausted() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, 2).await;

    for _ in 0..2 {
        let (status, body) = send(&app, get("/next?viewer=alice")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.unwrap()["meta"]["query"], "benchmarks");
    }
    let (status, body) = send(&app, get("/next?viewer=alice")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_none());
}

#[tokio::test]
async fn test_reset_route() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, 3).await;
    send(&app, get("/next?viewer=alice")).await;

    let (status, body) = send(
        &app,
        reset(serde_json::json!({"query": "corpus", "viewer": "alice"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["meta"]["query"], "corpus");

    let (_, next) = send(&app, get("/next?viewer=alice")).await;
    assert_eq!(next.unwrap()["meta"]["query"], "corpus");

    let (_, metrics) = send(&app, get("/metrics")).await;
    let metrics = metrics.unwrap();
    assert_eq!(metrics["total_resets"], 1);
    assert_eq!(metrics["total_delivered"], 3);
}

#[tokio::test]
async fn test_blank_reset_is_bad_request() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir, 2).await;

    let (status, body) = send(&app, reset(serde_json::json!({"query": " "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.unwrap()["category"], "QueryEmpty");

    let (_, metrics) = send(&app, get("/metrics")).await;
    assert_eq!(metrics.unwrap()["failed_resets"], 1);
}
