//! Ingestion HTTP surface: deduplication endpoints, feed fetch, presets,
//! stored-article listing, and health.

use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use brainbot_common::{feed_presets, resolve_feed_url, Article, BrainbotError};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::dedup::Deduplicator;
use crate::extract::ContentExtractor;
use crate::feed::FeedReader;
use crate::filter::ExactMatchFilter;
use crate::index::VectorStore;
use crate::store::ArticleStore;

const DEFAULT_FETCH_COUNT: usize = 10;

pub struct AppState {
    pub feed_reader: FeedReader,
    pub extractor: ContentExtractor,
    pub dedup: Deduplicator,
    pub index: Arc<dyn VectorStore>,
    pub filter: Arc<dyn ExactMatchFilter>,
    pub store: Option<ArticleStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/deduplication/check", post(check_duplicate))
        .route("/api/deduplication/add", post(add_article))
        .route("/api/deduplication/process", post(process_article))
        .route("/api/deduplication/count", get(count_documents))
        .route("/api/deduplication/clear", post(clear_all))
        .route("/api/chroma/articles", get(list_articles))
        .route("/fetch", post(fetch_feed))
        .route("/presets", get(presets))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(err: &BrainbotError) -> Response {
    let status = match err {
        BrainbotError::Validation(_) => StatusCode::BAD_REQUEST,
        BrainbotError::StateConflict => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": err.to_string()}))).into_response()
}

fn bad_request(rejection: JsonRejection) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": rejection.body_text()})),
    )
        .into_response()
}

async fn health(State(state): State<Arc<AppState>>) -> Response {
    let chroma = state.index.ping().await;
    let filter = state.filter.ping().await;

    let component = |result: &Result<(), BrainbotError>| match result {
        Ok(()) => json!("ok"),
        Err(e) => json!({"error": e.to_string()}),
    };
    let healthy = chroma.is_ok();

    Json(json!({
        "status": if healthy { "ok" } else { "degraded" },
        "components": {
            "vector_store": component(&chroma),
            "exact_match_filter": component(&filter),
            "object_store": if state.store.is_some() { "enabled" } else { "disabled" },
        }
    }))
    .into_response()
}

async fn check_duplicate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Article>, JsonRejection>,
) -> Response {
    let Json(article) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection),
    };

    match state.dedup.check_article(&article).await {
        Ok(decision) => Json(decision).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn add_article(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Article>, JsonRejection>,
) -> Response {
    let Json(article) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection),
    };

    if article.best_content().is_empty() {
        // Infrastructure-shaped failure by contract: the caller sent an
        // article the pipeline cannot embed.
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "article has no content to add"})),
        )
            .into_response();
    }

    match state.dedup.insert_article(&article).await {
        Ok(()) => Json(json!({"status": "added", "article_id": article.id})).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn process_article(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Article>, JsonRejection>,
) -> Response {
    let Json(article) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection),
    };

    let decision = match state.dedup.process_article(&article).await {
        Ok(decision) => decision,
        Err(e) => return error_response(&e),
    };

    let content = article.best_content();
    let mut presigned_url: Option<String> = None;

    if let Some(store) = &state.store {
        if decision.is_duplicate {
            // Exact duplicates leave the stored object untouched; similar
            // duplicates append behind the group separator. Append failures
            // do not overturn the decision.
            if !decision.is_exact_duplicate {
                if let Some(matching_id) = &decision.matching_id {
                    if let Err(e) = store.append(matching_id, content).await {
                        warn!(matching_id = %matching_id, error = %e, "Append to existing object failed");
                    }
                }
            }
        } else if !content.is_empty() {
            if let Err(e) = store.create(&article.id, &article.title, content).await {
                return error_response(&e);
            }
            match store.presigned_url(&article.id).await {
                Ok(url) => presigned_url = Some(url),
                Err(e) => warn!(id = %article.id, error = %e, "Presign failed, omitting URL"),
            }
        }
    }

    let status = if decision.is_duplicate { "duplicate" } else { "new" };
    let mut body = json!({
        "status": status,
        "deduplication_result": decision,
    });
    if let Some(url) = presigned_url {
        body["presigned_url"] = json!(url);
    }
    Json(body).into_response()
}

async fn count_documents(State(state): State<Arc<AppState>>) -> Response {
    match state.index.count().await {
        Ok(count) => Json(json!({"count": count})).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn clear_all(State(state): State<Arc<AppState>>) -> Response {
    if let Err(e) = state.index.clear_collection().await {
        return error_response(&e);
    }
    if let Err(e) = state.filter.clear().await {
        return error_response(&e);
    }
    info!("Cleared vector collection and exact-match filter");
    Json(json!({"status": "cleared"})).into_response()
}

#[derive(Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_articles(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    match state.index.list(query.limit).await {
        Ok(documents) => {
            let items: Vec<serde_json::Value> = documents
                .into_iter()
                .map(|doc| {
                    let preview: String = doc.document.chars().take(200).collect();
                    json!({
                        "id": doc.id,
                        "metadata": doc.metadata,
                        "document": preview,
                    })
                })
                .collect();
            Json(json!({"articles": items})).into_response()
        }
        Err(e) => error_response(&e),
    }
}

#[derive(Deserialize)]
struct FetchRequest {
    #[serde(default)]
    feed_preset: String,
    #[serde(default)]
    count: usize,
}

/// Fetch one feed (preset key or literal URL), or the union of all presets
/// when the key is empty, then run content extraction over the articles.
/// Per-feed failures in the union case are logged and skipped.
async fn fetch_feed(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FetchRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection),
    };
    let count = if request.count == 0 {
        DEFAULT_FETCH_COUNT
    } else {
        request.count
    };

    let mut articles: Vec<Article> = Vec::new();
    if request.feed_preset.is_empty() {
        for (key, preset) in feed_presets() {
            match state.feed_reader.fetch(&preset.url, count).await {
                Ok(mut items) => articles.append(&mut items),
                Err(e) => warn!(preset = key, error = %e, "Feed fetch failed, skipping"),
            }
        }
    } else {
        let url = resolve_feed_url(&request.feed_preset);
        match state.feed_reader.fetch(&url, count).await {
            Ok(items) => articles = items,
            Err(e) => return error_response(&e),
        }
    }

    let articles = state.extractor.extract_all(articles).await;
    Json(articles).into_response()
}

async fn presets() -> Response {
    Json(json!(feed_presets())).into_response()
}
