//! Completion consumer: receives generation-complete payloads from the
//! message bus and advances the state machine.
//!
//! Commit discipline: payloads that fail validation are committed anyway so
//! a poison message cannot loop forever; payloads that fail processing are
//! not committed and will be redelivered.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use brainbot_common::WebhookPayload;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::state::StateManager;

/// Outcome of handling one bus message, deciding the commit behavior.
#[derive(Debug, PartialEq, Eq)]
pub enum MessageOutcome {
    /// Applied to the state machine; commit.
    Processed,
    /// Undecodable or missing its uuid; commit to avoid a poison loop.
    Invalid(String),
    /// Transient processing failure; do not commit, allow redelivery.
    RetryLater(String),
}

/// Decode and validate a raw payload. Pure so the contract is testable
/// without a broker.
pub fn classify_payload(bytes: &[u8]) -> Result<WebhookPayload, String> {
    let payload: WebhookPayload = serde_json::from_slice(bytes)
        .map_err(|e| format!("undecodable completion payload: {e}"))?;
    if !payload.is_valid() {
        return Err("completion payload missing uuid".to_string());
    }
    Ok(payload)
}

pub struct CompletionConsumer {
    consumer: StreamConsumer,
    state: Arc<StateManager>,
    topic: String,
}

impl CompletionConsumer {
    pub fn new(
        brokers: &str,
        group_id: &str,
        topic: &str,
        state: Arc<StateManager>,
    ) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .context("Failed to create bus consumer")?;
        Ok(Self {
            consumer,
            state,
            topic: topic.to_string(),
        })
    }

    /// Consume until shutdown is signalled, then drain within a short
    /// grace window.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        self.consumer
            .subscribe(&[&self.topic])
            .context("Failed to subscribe to completion topic")?;
        info!(topic = %self.topic, "Bus consumer subscribed");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = self.consumer.recv() => {
                    let message = match received {
                        Ok(message) => message,
                        Err(e) => {
                            warn!(error = %e, "Bus receive failed, retrying");
                            continue;
                        }
                    };

                    let bytes = message.payload().unwrap_or_default();
                    let outcome = self.handle(bytes).await;
                    match &outcome {
                        MessageOutcome::Processed | MessageOutcome::Invalid(_) => {
                            if let MessageOutcome::Invalid(reason) = &outcome {
                                warn!(reason = %reason, "Marking invalid completion message");
                            }
                            if let Err(e) =
                                self.consumer.commit_message(&message, CommitMode::Async)
                            {
                                warn!(error = %e, "Commit failed");
                            }
                        }
                        MessageOutcome::RetryLater(reason) => {
                            warn!(reason = %reason, "Leaving message uncommitted for redelivery");
                        }
                    }
                }
            }
        }

        // Drain window: finish any in-flight commit traffic before exit.
        tokio::time::sleep(Duration::from_millis(200)).await;
        info!("Bus consumer stopped");
        Ok(())
    }

    async fn handle(&self, bytes: &[u8]) -> MessageOutcome {
        match classify_payload(bytes) {
            Ok(payload) => {
                self.state.set_webhook_payload(payload).await;
                MessageOutcome::Processed
            }
            Err(reason) => MessageOutcome::Invalid(reason),
        }
    }
}
