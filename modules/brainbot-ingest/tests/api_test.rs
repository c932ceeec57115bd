//! Ingestion HTTP surface against in-memory fakes: response shapes, status
//! codes, and the write semantics of the process endpoint.

mod support;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use brainbot_ingest::dedup::{DedupConfig, Deduplicator};
use brainbot_ingest::extract::{ContentExtractor, HttpPageFetcher};
use brainbot_ingest::feed::FeedReader;
use brainbot_ingest::routes::{router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

use support::{make_article, FakeFilter, FakeIndex};

fn build_app() -> (axum::Router, Arc<FakeIndex>, Arc<FakeFilter>) {
    let index = Arc::new(FakeIndex::default());
    let filter = Arc::new(FakeFilter::default());
    let dedup = Deduplicator::new(index.clone(), filter.clone(), DedupConfig::default());

    let state = Arc::new(AppState {
        feed_reader: FeedReader::new(),
        extractor: ContentExtractor::new(Arc::new(HttpPageFetcher::new()), 2),
        dedup,
        index: index.clone(),
        filter: filter.clone(),
        store: None,
    });
    (router(state), index, filter)
}

async fn send(app: &axum::Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(value) => Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn process_new_article_then_exact_duplicate() {
    let (app, index, _) = build_app();
    let article = make_article("A", "Hello World", "https://ex/a", &"x".repeat(200));
    let body = serde_json::to_value(&article).unwrap();

    let (status, first) = send(&app, "POST", "/api/deduplication/process", Some(body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["status"], "new");
    assert_eq!(first["deduplication_result"]["is_duplicate"], false);
    // Object store disabled in this harness, so no URL is issued.
    assert!(first.get("presigned_url").is_none());
    assert_eq!(index.ids(), vec!["A".to_string()]);

    let (status, second) = send(&app, "POST", "/api/deduplication/process", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["status"], "duplicate");
    assert_eq!(second["deduplication_result"]["is_exact_duplicate"], true);
    assert_eq!(second["deduplication_result"]["matching_id"], "A");
    assert_eq!(index.ids().len(), 1);
}

#[tokio::test]
async fn check_endpoint_reports_without_inserting() {
    let (app, index, _) = build_app();
    let article = make_article("B", "Check Only", "https://ex/b", &"y".repeat(200));

    let (status, body) = send(
        &app,
        "POST",
        "/api/deduplication/check",
        Some(serde_json::to_value(&article).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_duplicate"], false);
    assert!(index.ids().is_empty());
}

#[tokio::test]
async fn malformed_body_is_rejected_with_400() {
    let (app, _, _) = build_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/deduplication/process")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(value["error"].is_string());
}

#[tokio::test]
async fn add_with_empty_content_is_500() {
    let (app, _, _) = build_app();
    let article = make_article("C", "", "", "");

    let (status, body) = send(
        &app,
        "POST",
        "/api/deduplication/add",
        Some(serde_json::to_value(&article).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn add_then_count_then_clear() {
    let (app, index, filter) = build_app();
    let article = make_article("D", "Counted", "https://ex/d", &"z".repeat(120));

    let (status, body) = send(
        &app,
        "POST",
        "/api/deduplication/add",
        Some(serde_json::to_value(&article).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "added");
    assert_eq!(body["article_id"], "D");

    let (status, body) = send(&app, "GET", "/api/deduplication/count", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send(&app, "POST", "/api/deduplication/clear", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cleared");
    assert!(index.ids().is_empty());
    assert!(filter.keys.lock().unwrap().is_empty());

    let (_, body) = send(&app, "GET", "/api/deduplication/count", None).await;
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn articles_listing_previews_documents() {
    let (app, index, _) = build_app();
    index.seed(
        "E",
        &"long document ".repeat(50),
        support::stored_metadata("E", chrono::Utc::now()),
    );

    let (status, body) = send(&app, "GET", "/api/chroma/articles", None).await;
    assert_eq!(status, StatusCode::OK);
    let articles = body["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0]["id"], "E");
    assert!(articles[0]["document"].as_str().unwrap().chars().count() <= 200);
}

#[tokio::test]
async fn presets_lists_known_feeds() {
    let (app, _, _) = build_app();
    let (status, body) = send(&app, "GET", "/presets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["bb"]["url"].as_str().unwrap().contains("bbci"));
    assert!(body["np"]["name"].as_str().unwrap().contains("NPR"));
}

#[tokio::test]
async fn health_reports_components() {
    let (app, _, _) = build_app();
    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["vector_store"], "ok");
    assert_eq!(body["components"]["object_store"], "disabled");
}

#[tokio::test]
async fn process_with_json_of_wrong_shape_is_400() {
    let (app, _, _) = build_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/deduplication/process",
        Some(json!({"id": 42})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}
