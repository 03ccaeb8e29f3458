mod api;
mod cli;
mod doc;
mod live;
mod router;
mod startup;
mod state;

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    listpilot_core::config::load_dotenv();
    let config = listpilot_core::Config::from_env();
    config.log_summary();

    let args: Vec<String> = std::env::args().collect();
    if cli::dispatch(&config, &args).await? {
        return Ok(());
    }

    let memory_mode = cli::parse_serve_args(&args);
    let state = startup::build_app_state(config, memory_mode).await?;

    let shutdown = Arc::new(Notify::new());
    let heartbeat = startup::spawn_background_tasks(&state, shutdown.clone());

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listpilot gateway listening on {addr}");

    let router = router::build_router(state);
    let server_shutdown = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            server_shutdown.notify_waiters();
        })
        .await?;

    // Final heartbeat marks this worker stopped rather than letting the
    // monitor flag it stale.
    heartbeat.stop().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM");
        tokio::select! {
            _ = sigint.recv() => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl_c");
    }
}
