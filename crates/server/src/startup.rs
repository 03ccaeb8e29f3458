//! Server startup: shared state initialization and background task spawning.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{info, warn};

use listpilot_core::directory::DirectoryCatalog;
use listpilot_core::Config;
use listpilot_flow::{Orchestrator, Subscriber};
use listpilot_oracle::client::{FieldMapper, OracleWithFallback};
use listpilot_queue::consumer::{QueueConsumer, QueuePublisher};
use listpilot_queue::{MemoryQueue, SqsQueue};
use listpilot_store::traits::{HeartbeatStore, Store};
use listpilot_store::{init_pg_pool, MemoryStore, PgStore};
use listpilot_worker::browser::{BrowserSession, RemoteBrowser, SimulatedBrowser};
use listpilot_worker::captcha::{CaptchaSolver, HttpCaptchaSolver};
use listpilot_worker::heartbeat::{worker_id, HeartbeatTask};
use listpilot_worker::monitor::StaleWorkerMonitor;
use listpilot_worker::submit::SubmissionRunner;

use crate::state::AppState;

/// Build `AppState`, degrading gracefully when external services are not
/// configured: Postgres falls back to the in-memory store, SQS to the
/// in-memory queue.
pub async fn build_app_state(config: Config, memory_mode: bool) -> anyhow::Result<Arc<AppState>> {
    let store: Arc<dyn Store> = if memory_mode {
        info!("Memory mode: using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        match init_pg_pool(&config.postgres).await {
            Some(pool) => Arc::new(PgStore::new(pool)),
            None => Arc::new(MemoryStore::new()),
        }
    };

    let (consumer, publisher): (Arc<dyn QueueConsumer>, Arc<dyn QueuePublisher>) =
        if memory_mode || !config.queue.is_configured() {
            if !memory_mode {
                warn!("QUEUE_URL not set — using in-memory queue");
            }
            let queue = Arc::new(MemoryQueue::new(
                Duration::from_secs(config.queue.visibility_timeout_secs as u64),
                config.queue.max_receive_count,
            ));
            (queue.clone(), queue)
        } else {
            let queue = Arc::new(SqsQueue::new(&config.aws, &config.queue).await?);
            (queue.clone(), queue)
        };

    let catalog =
        DirectoryCatalog::load_or_builtin(config.flow.directory_catalog.as_deref().map(Path::new));
    info!(directories = catalog.len(), "Directory catalog loaded");

    Ok(Arc::new(AppState {
        config,
        store,
        consumer,
        publisher,
        catalog,
        memory_mode,
        started_at: Utc::now(),
    }))
}

/// Wire the orchestration pipeline for this process.
pub fn build_orchestrator(state: &Arc<AppState>) -> Orchestrator {
    let mapper: Arc<dyn FieldMapper> = Arc::new(OracleWithFallback::from_config(&state.config.oracle));

    let browser: Arc<dyn BrowserSession> = if state.memory_mode {
        info!("Memory mode: submissions run against the simulated browser");
        Arc::new(SimulatedBrowser)
    } else {
        Arc::new(RemoteBrowser::from_config(&state.config.browser))
    };

    let captcha: Option<Arc<dyn CaptchaSolver>> = HttpCaptchaSolver::from_config(&state.config.browser)
        .map(|solver| Arc::new(solver) as Arc<dyn CaptchaSolver>);
    if captcha.is_none() {
        warn!("No captcha solver configured — captcha-protected directories will be queued for review");
    }

    let runner = Arc::new(SubmissionRunner::new(browser, captcha));

    Orchestrator::new(
        state.store.clone(),
        mapper,
        runner,
        state.catalog.clone(),
        state.config.flow.clone(),
        worker_id(),
    )
}

/// Long-lived background work: subscriber loop, heartbeat ticks, and the
/// stale-worker monitor. The returned heartbeat handle must be kept alive
/// and stopped on shutdown for the final "stopped" beat.
pub fn spawn_background_tasks(state: &Arc<AppState>, shutdown: Arc<Notify>) -> HeartbeatTask {
    let orchestrator = build_orchestrator(state);
    let subscriber = Subscriber::new(
        state.consumer.clone(),
        state.store.clone(),
        orchestrator,
        &state.config.queue,
        &state.config.flow,
        worker_id(),
    );
    tokio::spawn(subscriber.run(shutdown.clone()));

    let heartbeat_store: Arc<dyn HeartbeatStore> = state.store.clone();
    let heartbeat = HeartbeatTask::spawn(
        heartbeat_store,
        worker_id(),
        Duration::from_secs(state.config.heartbeat.interval_secs),
    );

    let monitor = StaleWorkerMonitor::new(
        state.store.clone(),
        Duration::from_secs(state.config.heartbeat.stale_after_secs()),
    );
    tokio::spawn(monitor.run(
        Duration::from_secs(state.config.heartbeat.monitor_interval_secs),
        shutdown,
    ));

    heartbeat
}
