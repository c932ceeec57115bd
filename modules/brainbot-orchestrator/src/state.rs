//! Workflow state machine: a single process-wide state object behind a
//! read/write lock. Every mutation goes through the manager; status reads
//! return a deep snapshot so callers never observe a half-written cycle.

use std::collections::VecDeque;

use brainbot_common::{Article, BrainbotError, WebhookPayload};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

pub const LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    #[default]
    Idle,
    Clearing,
    Fetching,
    Deduplicating,
    Sending,
    Waiting,
    Complete,
    Error,
}

impl std::fmt::Display for WorkflowStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WorkflowStage::Idle => "idle",
            WorkflowStage::Clearing => "clearing",
            WorkflowStage::Fetching => "fetching",
            WorkflowStage::Deduplicating => "deduplicating",
            WorkflowStage::Sending => "sending",
            WorkflowStage::Waiting => "waiting",
            WorkflowStage::Complete => "complete",
            WorkflowStage::Error => "error",
        };
        write!(f, "{name}")
    }
}

/// Stages from which a new cycle may be triggered.
pub const TRIGGERABLE: &[WorkflowStage] = &[
    WorkflowStage::Idle,
    WorkflowStage::Complete,
    WorkflowStage::Error,
];

/// Stages from which the cron trigger may fire: an errored workflow stays
/// visible until a human or manual trigger picks it up.
pub const CRON_TRIGGERABLE: &[WorkflowStage] = &[WorkflowStage::Idle, WorkflowStage::Complete];

/// Per-article outcome of one cycle, aggregated into the status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleOutcome {
    pub article_id: String,
    pub url: String,
    /// One of "new", "duplicate", "failed", "error".
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Default)]
struct WorkflowState {
    stage: WorkflowStage,
    articles: Vec<Article>,
    dedup_results: Vec<ArticleOutcome>,
    generation_uuid: String,
    webhook_payload: Option<WebhookPayload>,
    last_error: Option<String>,
    logs: VecDeque<LogEntry>,
}

/// Deep copy of the workflow state for external observers.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub state: WorkflowStage,
    pub article_count: usize,
    pub new_count: usize,
    pub duplicate_count: usize,
    pub failed_count: usize,
    pub error_count: usize,
    pub generation_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_payload: Option<WebhookPayload>,
    pub logs: Vec<LogEntry>,
}

#[derive(Default)]
pub struct StateManager {
    inner: RwLock<WorkflowState>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stage(&self) -> WorkflowStage {
        self.inner.read().await.stage
    }

    pub async fn set_stage(&self, stage: WorkflowStage) {
        let mut state = self.inner.write().await;
        state.stage = stage;
    }

    /// Atomically claim the state machine for a new cycle. Fails with a
    /// conflict unless the current stage is in `allowed_from`; on success
    /// the previous cycle's data is reset and the stage moves to `initial`.
    pub async fn begin_cycle(
        &self,
        allowed_from: &[WorkflowStage],
        initial: WorkflowStage,
    ) -> Result<(), BrainbotError> {
        let mut state = self.inner.write().await;
        if !allowed_from.contains(&state.stage) {
            return Err(BrainbotError::StateConflict);
        }
        state.stage = initial;
        state.articles.clear();
        state.dedup_results.clear();
        state.generation_uuid.clear();
        state.webhook_payload = None;
        state.last_error = None;
        push_log(&mut state, format!("Cycle started (stage: {initial})"));
        Ok(())
    }

    pub async fn add_log(&self, message: impl Into<String>) {
        let mut state = self.inner.write().await;
        push_log(&mut state, message.into());
    }

    /// Record a failure: stage moves to Error, the message becomes the
    /// last-error string and a log entry.
    pub async fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        let mut state = self.inner.write().await;
        state.stage = WorkflowStage::Error;
        state.last_error = Some(message.clone());
        push_log(&mut state, format!("Error: {message}"));
    }

    pub async fn set_articles(&self, articles: Vec<Article>) {
        let mut state = self.inner.write().await;
        state.articles = articles;
    }

    pub async fn set_dedup_results(&self, results: Vec<ArticleOutcome>) {
        let mut state = self.inner.write().await;
        state.dedup_results = results;
    }

    pub async fn set_generation_uuid(&self, uuid: impl Into<String>) {
        let mut state = self.inner.write().await;
        state.generation_uuid = uuid.into();
    }

    /// The only transition into Complete from Waiting; accepted from any
    /// stage so a completion that races the runner is never lost.
    pub async fn set_webhook_payload(&self, payload: WebhookPayload) {
        let mut state = self.inner.write().await;
        let message = format!(
            "Webhook received for uuid {} (status: {})",
            payload.uuid, payload.status
        );
        info!(uuid = %payload.uuid, status = %payload.status, "Generation complete");
        state.webhook_payload = Some(payload);
        state.stage = WorkflowStage::Complete;
        push_log(&mut state, message);
    }

    /// Pure read: a consistent deep copy under the shared lock.
    pub async fn status(&self) -> StatusSnapshot {
        let state = self.inner.read().await;
        let count_of = |status: &str| {
            state
                .dedup_results
                .iter()
                .filter(|r| r.status == status)
                .count()
        };
        StatusSnapshot {
            state: state.stage,
            article_count: state.articles.len(),
            new_count: count_of("new"),
            duplicate_count: count_of("duplicate"),
            failed_count: count_of("failed"),
            error_count: count_of("error"),
            generation_uuid: state.generation_uuid.clone(),
            last_error: state.last_error.clone(),
            webhook_payload: state.webhook_payload.clone(),
            logs: state.logs.iter().cloned().collect(),
        }
    }
}

fn push_log(state: &mut WorkflowState, message: String) {
    if state.logs.len() >= LOG_CAPACITY {
        state.logs.pop_front();
    }
    state.logs.push_back(LogEntry {
        timestamp: Utc::now(),
        message,
    });
}
