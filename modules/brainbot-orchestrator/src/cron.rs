//! Periodic trigger: fires an automatic full run on a cron schedule, but
//! only when the workflow is idle or complete. Busy cycles are skipped
//! with a log line rather than queued.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use cron::Schedule;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::runner::WorkflowRunner;
use crate::state::{StateManager, WorkflowStage, CRON_TRIGGERABLE};

pub struct CronTrigger {
    schedule: Schedule,
    state: Arc<StateManager>,
    runner: Arc<WorkflowRunner>,
}

impl CronTrigger {
    pub fn new(
        schedule: &str,
        state: Arc<StateManager>,
        runner: Arc<WorkflowRunner>,
    ) -> Result<Self> {
        let schedule = Schedule::from_str(schedule)
            .with_context(|| format!("Invalid cron schedule: {schedule}"))?;
        Ok(Self {
            schedule,
            state,
            runner,
        })
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(schedule = %self.schedule, "Cron trigger armed");
        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                warn!("Cron schedule has no future fire times, stopping trigger");
                return;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.changed() => {
                    info!("Cron trigger stopped");
                    return;
                }
            }

            match self
                .state
                .begin_cycle(CRON_TRIGGERABLE, WorkflowStage::Clearing)
                .await
            {
                Ok(()) => {
                    info!("Cron trigger firing automatic run");
                    self.state.add_log("Cron trigger: starting cycle").await;
                    let runner = Arc::clone(&self.runner);
                    tokio::spawn(async move { runner.run("").await });
                }
                Err(_) => {
                    let stage = self.state.stage().await;
                    self.state
                        .add_log(format!("Cron trigger skipped, workflow busy ({stage})"))
                        .await;
                }
            }
        }
    }
}
