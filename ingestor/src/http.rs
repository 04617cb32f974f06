use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::errors::Result;
use crate::metrics;
use crate::model::{HealthResponse, WorkerState};

#[derive(Debug, Clone)]
struct AppState {
    worker_state: watch::Receiver<WorkerState>,
}

pub fn create_router(worker_state: watch::Receiver<WorkerState>) -> Router {
    let state = AppState { worker_state };

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Serves `router` on `addr` until `ct` is cancelled.
pub async fn serve(addr: &str, router: Router, ct: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await?;
    Ok(())
}

async fn metrics_handler() -> std::result::Result<String, AppError> {
    Ok(metrics::gather_metrics()?)
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let current = *state.worker_state.borrow();
    let status = if current == WorkerState::Running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(HealthResponse { state: current }))
}

struct AppError(anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("API error: {}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Internal server error: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
