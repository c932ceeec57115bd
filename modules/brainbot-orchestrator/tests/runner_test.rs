//! Workflow runner cycles against fake ingest/generation services.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use brainbot_common::WebhookPayload;
use brainbot_orchestrator::runner::WorkflowRunner;
use brainbot_orchestrator::state::{StateManager, WorkflowStage};

use support::{article, broken_article, FakeGeneration, FakeIngest};

fn harness(
    ingest: FakeIngest,
) -> (
    Arc<StateManager>,
    Arc<FakeIngest>,
    Arc<FakeGeneration>,
    WorkflowRunner,
) {
    let state = Arc::new(StateManager::new());
    let ingest = Arc::new(ingest);
    let generation = Arc::new(FakeGeneration::default());
    let runner = WorkflowRunner::new(
        Arc::clone(&state),
        ingest.clone(),
        generation.clone(),
    );
    (state, ingest, generation, runner)
}

#[tokio::test]
async fn cycle_with_no_new_articles_completes_without_generation() {
    let ingest = FakeIngest::with_articles(vec![
        article("a1", "https://ex/a1"),
        article("a2", "https://ex/a2"),
    ]);
    let (state, _, generation, runner) = harness(ingest);

    runner.run("bb").await;

    let status = state.status().await;
    assert_eq!(status.state, WorkflowStage::Complete);
    assert_eq!(status.article_count, 2);
    assert_eq!(status.new_count, 0);
    assert_eq!(status.duplicate_count, 2);
    assert_eq!(status.generation_uuid, "");
    assert!(generation.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cycle_with_new_articles_requests_generation_and_waits() {
    let ingest = FakeIngest::with_articles(vec![
        article("a1", "https://ex/a1"),
        article("a2", "https://ex/a2"),
        article("a3", "https://ex/a3"),
    ]);
    ingest.mark_new("a2");
    ingest.mark_new("a3");
    let (state, _, generation, runner) = harness(ingest);

    runner.run("bb").await;

    let status = state.status().await;
    assert_eq!(status.state, WorkflowStage::Waiting);
    assert_eq!(status.new_count, 2);
    assert!(!status.generation_uuid.is_empty());

    let calls = generation.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    let (uuid, presigned, urls) = &calls[0];
    assert_eq!(uuid, &status.generation_uuid);
    // First available presigned URL among the new articles.
    assert_eq!(presigned.as_deref(), Some("https://store.example/a2"));
    assert_eq!(urls, &vec!["https://ex/a2".to_string(), "https://ex/a3".to_string()]);
}

#[tokio::test]
async fn fetch_failure_moves_to_error_state() {
    let ingest = FakeIngest::default();
    ingest.fail_fetch.store(true, Ordering::SeqCst);
    let (state, _, generation, runner) = harness(ingest);

    runner.run("bb").await;

    let status = state.status().await;
    assert_eq!(status.state, WorkflowStage::Error);
    assert!(status.last_error.unwrap().contains("feed unreachable"));
    assert!(generation.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn clear_failure_aborts_before_fetching() {
    let ingest = FakeIngest::with_articles(vec![article("a1", "https://ex/a1")]);
    ingest.fail_clear.store(true, Ordering::SeqCst);
    let (state, ingest, _, runner) = harness(ingest);

    runner.run("bb").await;

    let status = state.status().await;
    assert_eq!(status.state, WorkflowStage::Error);
    assert_eq!(status.article_count, 0, "fetch never ran");
    assert_eq!(ingest.process_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn refresh_skips_the_clear_step() {
    let ingest = FakeIngest::with_articles(vec![article("a1", "https://ex/a1")]);
    // A failing clear proves refresh never touches it.
    ingest.fail_clear.store(true, Ordering::SeqCst);
    let (state, ingest, _, runner) = harness(ingest);

    runner.run_refresh("bb").await;

    assert_eq!(state.status().await.state, WorkflowStage::Complete);
    assert_eq!(ingest.clear_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn per_article_failures_do_not_abort_the_cycle() {
    let ingest = FakeIngest::with_articles(vec![
        article("ok1", "https://ex/ok1"),
        article("bad", "https://ex/bad"),
        article("ok2", "https://ex/ok2"),
    ]);
    ingest.mark_new("ok2");
    ingest.mark_failing("bad");
    let (state, _, generation, runner) = harness(ingest);

    runner.run("bb").await;

    let status = state.status().await;
    assert_eq!(status.state, WorkflowStage::Waiting, "cycle continued past the failure");
    assert_eq!(status.error_count, 1);
    assert_eq!(status.new_count, 1);
    assert_eq!(status.duplicate_count, 1);
    assert_eq!(generation.calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn unextractable_articles_are_marked_failed_without_processing() {
    let ingest = FakeIngest::with_articles(vec![
        broken_article("dead"),
        article("live", "https://ex/live"),
    ]);
    let (state, ingest, _, runner) = harness(ingest);

    runner.run("bb").await;

    let status = state.status().await;
    assert_eq!(status.failed_count, 1);
    assert_eq!(status.duplicate_count, 1);
    assert_eq!(
        ingest.process_calls.load(Ordering::SeqCst),
        1,
        "broken article never hit the process endpoint"
    );
}

#[tokio::test]
async fn generation_failure_moves_to_error_state() {
    let ingest = FakeIngest::with_articles(vec![article("a1", "https://ex/a1")]);
    ingest.mark_new("a1");
    let (state, _, generation, runner) = harness(ingest);
    generation.fail.store(true, Ordering::SeqCst);

    runner.run("bb").await;

    let status = state.status().await;
    assert_eq!(status.state, WorkflowStage::Error);
    assert!(status.last_error.unwrap().contains("503"));
    assert_eq!(status.generation_uuid, "", "uuid only recorded on success");
}

#[tokio::test]
async fn completion_payload_finishes_a_waiting_cycle() {
    let ingest = FakeIngest::with_articles(vec![article("a1", "https://ex/a1")]);
    ingest.mark_new("a1");
    let (state, _, _, runner) = harness(ingest);

    runner.run("bb").await;
    assert_eq!(state.status().await.state, WorkflowStage::Waiting);
    let uuid = state.status().await.generation_uuid;

    state
        .set_webhook_payload(WebhookPayload {
            uuid: uuid.clone(),
            status: "success".into(),
            voiceover: "v".into(),
            ..Default::default()
        })
        .await;

    let status = state.status().await;
    assert_eq!(status.state, WorkflowStage::Complete);
    assert_eq!(status.webhook_payload.unwrap().uuid, uuid);
}
