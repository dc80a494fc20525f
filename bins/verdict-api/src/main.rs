mod handlers;
mod routes;


use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use verdict_common::ExecutionConfig;
use verdict_engine::{Dispatcher, TestRunner};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ExecutionConfig>,
    pub dispatcher: Arc<Dispatcher>,
    pub runner: TestRunner,
}

impl AppState {
    pub fn new(config: ExecutionConfig) -> Self {
        let config = Arc::new(config);
        let dispatcher = Arc::new(Dispatcher::new(config.clone()));
        Self {
            runner: TestRunner::new(dispatcher.clone()),
            dispatcher,
            config,
        }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new().merge(routes::routes()).with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Verdict API booting...");

    let config = ExecutionConfig::load_default().context("Failed to load execution config")?;
    info!(
        enabled = config.enabled,
        default_timeout_seconds = config.default_timeout_seconds,
        max_memory_mb = config.max_memory_mb,
        work_dir = %config.work_dir.display(),
        "Execution config loaded"
    );

    let state = Arc::new(AppState::new(config));
    let app = app(state);

    let addr = std::env::var("VERDICT_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Verdict API stopped");
    Ok(())
}

/// `LOG_FORMAT=json` switches to JSON lines; the filter comes from `RUST_LOG`
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
