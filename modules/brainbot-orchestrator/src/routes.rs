//! Trigger HTTP surface: status snapshot, manual start/refresh triggers,
//! the direct webhook endpoint, and liveness.

use std::sync::Arc;

use axum::{
    extract::rejection::JsonRejection,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use brainbot_common::WebhookPayload;
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::runner::WorkflowRunner;
use crate::state::{StateManager, WorkflowStage, TRIGGERABLE};

pub struct AppState {
    pub state: Arc<StateManager>,
    pub runner: Arc<WorkflowRunner>,
}

pub fn router(app: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/start", post(start))
        .route("/api/refresh", post(refresh))
        .route("/webhook", post(webhook))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(app)
}

#[derive(Debug, Default, Deserialize)]
struct TriggerRequest {
    #[serde(default)]
    feed_preset: String,
}

async fn status(State(app): State<Arc<AppState>>) -> Response {
    Json(app.state.status().await).into_response()
}

async fn health() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

async fn start(
    State(app): State<Arc<AppState>>,
    body: Option<Json<TriggerRequest>>,
) -> Response {
    trigger(app, body.map(|Json(b)| b).unwrap_or_default(), false).await
}

async fn refresh(
    State(app): State<Arc<AppState>>,
    body: Option<Json<TriggerRequest>>,
) -> Response {
    trigger(app, body.map(|Json(b)| b).unwrap_or_default(), true).await
}

/// Claim the state machine, then launch the cycle asynchronously. The
/// conflict check is the single concurrency gate: one active cycle at most.
async fn trigger(app: Arc<AppState>, request: TriggerRequest, refresh: bool) -> Response {
    let initial = if refresh {
        WorkflowStage::Fetching
    } else {
        WorkflowStage::Clearing
    };

    if app.state.begin_cycle(TRIGGERABLE, initial).await.is_err() {
        let stage = app.state.stage().await;
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": format!("workflow already active ({stage})")})),
        )
            .into_response();
    }

    let feed = request.feed_preset;
    info!(feed = %feed, refresh, "Manual trigger accepted");
    let runner = Arc::clone(&app.runner);
    tokio::spawn(async move {
        if refresh {
            runner.run_refresh(&feed).await;
        } else {
            runner.run(&feed).await;
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(json!({"status": "accepted", "refresh": refresh})),
    )
        .into_response()
}

/// Direct completion path, equivalent to a bus delivery.
async fn webhook(
    State(app): State<Arc<AppState>>,
    body: Result<Json<WebhookPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": rejection.body_text()})),
            )
                .into_response()
        }
    };

    if !payload.is_valid() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "payload missing uuid"})),
        )
            .into_response();
    }

    app.state.set_webhook_payload(payload).await;
    Json(json!({"status": "ok"})).into_response()
}
