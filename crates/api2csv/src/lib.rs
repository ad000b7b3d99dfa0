// HTTP trigger host for the ingestion jobs
//
// Runs anywhere an HTTP server can:
// - Azure Functions custom handler (port from FUNCTIONS_CUSTOMHANDLER_PORT)
// - Docker containers / VMs
// - Local development against filesystem or memory storage
//
// Features:
// - Axum HTTP server, one route per job
// - Per-invocation JobContext (config, HTTP client, secrets, storage)
// - Structured logging with tracing
// - Graceful shutdown

use anyhow::{Context, Result};
use api2csv_config::RuntimeConfig;
use api2csv_sources::SourceError;
use api2csv_storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

mod handlers;
mod init;
pub mod jobs;

use handlers::{
    analytics_report, analytics_token, backend_report, health_check, insta_insights, insta_media,
    insta_merge, knmi_report,
};
pub use init::{init_tracing, Services};
pub use jobs::{JobContext, JobName, JobReport};

/// Application state shared across all requests
#[derive(Clone)]
pub(crate) struct AppState {
    pub services: Arc<Services>,
}

/// Error type that implements IntoResponse
pub(crate) struct AppError {
    status: StatusCode,
    error: anyhow::Error,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("Request error: {:?}", self.error);
        } else {
            warn!("Request rejected: {:#}", self.error);
        }
        (self.status, format!("{:#}", self.error)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let error = err.into();
        Self {
            status: status_for(&error),
            error,
        }
    }
}

/// Map the root causes jobs surface to response codes.
fn status_for(error: &anyhow::Error) -> StatusCode {
    for cause in error.chain() {
        if cause.downcast_ref::<jobs::InvalidInput>().is_some() {
            return StatusCode::BAD_REQUEST;
        }
        if let Some(storage) = cause.downcast_ref::<StorageError>() {
            if storage.is_not_found() {
                return StatusCode::NOT_FOUND;
            }
        }
        if let Some(source) = cause.downcast_ref::<SourceError>() {
            if source.is_upstream() {
                return StatusCode::BAD_GATEWAY;
            }
        }
    }
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Build the router serving every job route.
pub fn router(services: Services) -> Router {
    let state = AppState {
        services: Arc::new(services),
    };

    Router::new()
        .route("/api/insta-insights", get(insta_insights).post(insta_insights))
        .route("/api/insta-merge-files", get(insta_merge).post(insta_merge))
        .route("/api/insta-media", get(insta_media).post(insta_media))
        .route("/api/backend-report", get(backend_report).post(backend_report))
        .route("/api/knmi-report", get(knmi_report).post(knmi_report))
        .route(
            "/api/analytics-report",
            get(analytics_report).post(analytics_report),
        )
        .route(
            "/api/analytics-token",
            get(analytics_token).post(analytics_token),
        )
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}

/// Entry point for server mode (loads config automatically)
pub async fn run() -> Result<()> {
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    run_with_config(config).await
}

/// Entry point for server mode with pre-loaded configuration (for CLI usage)
pub async fn run_with_config(config: RuntimeConfig) -> Result<()> {
    init_tracing(&config);

    let addr = config.server.listen_addr.clone();
    let services = Services::from_config(config)?;
    let app = router(services);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context(format!("Failed to bind to {}", addr))?;

    info!("api2csv listening on http://{}", addr);
    info!("Routes:");
    info!("  GET|POST http://{}/api/insta-insights?since=YYYY-MM-DD", addr);
    info!("  GET|POST http://{}/api/insta-merge-files", addr);
    info!("  GET|POST http://{}/api/insta-media", addr);
    info!("  GET|POST http://{}/api/backend-report", addr);
    info!("  GET|POST http://{}/api/knmi-report", addr);
    info!("  GET|POST http://{}/api/analytics-report", addr);
    info!("  GET|POST http://{}/api/analytics-token", addr);
    info!("  GET      http://{}/health", addr);
    info!("Press Ctrl+C or send SIGTERM to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");

    Ok(())
}

/// Run a single job outside the server (CLI `run <job>`).
pub async fn run_once(config: RuntimeConfig, job: JobName, since: Option<&str>) -> Result<JobReport> {
    let since = match (job, since) {
        (JobName::Insights, raw) => Some(jobs::parse_since(raw)?),
        _ => None,
    };
    let services = Services::from_config(config)?;
    let ctx = JobContext::new(&services)?;
    jobs::run(job, &ctx, since).await
}
