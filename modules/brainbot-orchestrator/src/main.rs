use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use brainbot_common::Config;
use brainbot_orchestrator::bus::CompletionConsumer;
use brainbot_orchestrator::cron::CronTrigger;
use brainbot_orchestrator::routes::{router, AppState};
use brainbot_orchestrator::runner::{GenerationClient, IngestClient, WorkflowRunner};
use brainbot_orchestrator::state::StateManager;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("brainbot=info".parse()?))
        .init();

    info!("Brainbot orchestrator starting...");

    let config = Config::orchestrator_from_env();
    config.log_redacted();

    let state = Arc::new(StateManager::new());
    let runner = Arc::new(WorkflowRunner::new(
        Arc::clone(&state),
        Arc::new(IngestClient::new(&config.ingest_api_url)),
        Arc::new(GenerationClient::new(&config.generation_service_url)),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Completion consumer: failures to connect are fatal at startup so a
    // misconfigured broker is caught immediately.
    let consumer = CompletionConsumer::new(
        &config.bus_brokers,
        &config.bus_group_id,
        &config.bus_topic,
        Arc::clone(&state),
    )?;
    let consumer_task = tokio::spawn(consumer.run(shutdown_rx.clone()));

    let cron = CronTrigger::new(
        &config.cron_schedule,
        Arc::clone(&state),
        Arc::clone(&runner),
    )?;
    let cron_task = tokio::spawn(cron.run(shutdown_rx.clone()));

    let app = router(Arc::new(AppState {
        state: Arc::clone(&state),
        runner,
    }));
    let addr = format!("0.0.0.0:{}", config.http_port);
    info!(addr = %addr, "Orchestrator API listening");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the background tasks and give them a bounded drain window.
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(Duration::from_secs(2), consumer_task)
        .await
        .is_err()
    {
        warn!("Bus consumer did not drain in time");
    }
    if tokio::time::timeout(Duration::from_secs(2), cron_task)
        .await
        .is_err()
    {
        warn!("Cron trigger did not stop in time");
    }

    info!("Orchestrator stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install SIGINT handler");
    };
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
