//! Agent task server.
//!
//! Run with: `taskstream --scripted`, then create a task with
//! `POST /api/v1/tasks` and stream it from `/api/v1/ws/{task_id}`.

mod config;

use std::sync::Arc;

use clap::Parser;
use taskstream_core::AgentLoop;
use taskstream_executor::ScriptedAgentLoop;
use taskstream_session::TaskManager;
use taskstream_transport::{AppState, create_router};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::parse();
    let model = config.model_config();
    info!(?model, "Model configuration loaded");

    let agent: Arc<dyn AgentLoop> = if config.scripted {
        info!("Using scripted demo agent");
        Arc::new(ScriptedAgentLoop::demo())
    } else {
        Arc::new(config.process_agent()?)
    };

    let manager = TaskManager::new(agent, model);
    let app = create_router(AppState::new(Arc::new(manager)));

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down..."),
        () = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
