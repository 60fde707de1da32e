//! REST handlers for the dashboard views and operational endpoints.
//!
//! Every view request reloads the consolidated dataset from disk, so a fresh
//! ingestion run is visible without restarting the server.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sms_core::config::AnalysisConfig;
use sms_core::{Dataset, InsightsResult};
use sms_ingest::load_dataset;
use sms_reporting::{build_analysis, build_preview, AnalysisView, DataPreview};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// Shared application state for REST handlers.
#[derive(Clone)]
pub struct AppState {
    pub dataset_path: Arc<PathBuf>,
    pub analysis: Arc<AnalysisConfig>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(dataset_path: impl Into<PathBuf>, analysis: AnalysisConfig) -> Self {
        Self {
            dataset_path: Arc::new(dataset_path.into()),
            analysis: Arc::new(analysis),
            start_time: Instant::now(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: &str, message: impl Into<String>) -> ApiError {
    metrics::counter!("api.errors").increment(1);
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message: message.into(),
        }),
    )
}

/// Load the dataset and compute a view from it on the blocking pool.
async fn with_dataset<T, F>(state: &AppState, view: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Dataset, &AnalysisConfig) -> InsightsResult<T> + Send + 'static,
{
    metrics::counter!("api.requests").increment(1);

    let path = state.dataset_path.clone();
    if !path.exists() {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "dataset_unavailable",
            format!(
                "No consolidated dataset at '{}'; run the ingest command first",
                path.display()
            ),
        ));
    }

    let config = state.analysis.clone();
    let result = tokio::task::spawn_blocking(move || {
        let dataset = load_dataset(path.as_path())?;
        view(&dataset, config.as_ref())
    })
    .await;

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!(error = %e, "Failed to build view");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "view_failed",
                e.to_string(),
            ))
        }
        Err(e) => {
            error!(error = %e, "View task panicked");
            Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Internal processing error",
            ))
        }
    }
}

/// GET /api/preview — head rows, column types and shape.
pub async fn preview(State(state): State<AppState>) -> Result<Json<DataPreview>, ApiError> {
    with_dataset(&state, |ds, cfg| Ok(build_preview(ds, cfg.preview_rows)))
        .await
        .map(Json)
}

/// GET /api/analysis — every comparison, country view and test as JSON.
pub async fn analysis(State(state): State<AppState>) -> Result<Json<AnalysisView>, ApiError> {
    with_dataset(&state, build_analysis).await.map(Json)
}

/// GET /api/analysis.txt — the analysis view rendered as text.
pub async fn analysis_text(State(state): State<AppState>) -> Result<String, ApiError> {
    with_dataset(&state, |ds, cfg| Ok(build_analysis(ds, cfg)?.to_string())).await
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        dataset_path: state.dataset_path.display().to_string(),
        dataset_present: state.dataset_path.exists(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /live — Liveness probe.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub dataset_path: String,
    pub dataset_present: bool,
    pub uptime_secs: u64,
}
