//! Dashboard server: the HTTP views plus a Prometheus exporter.

use crate::rest::{self, AppState};
use axum::routing::get;
use axum::Router;
use sms_core::config::AppConfig;
use std::net::SocketAddr;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Routes and middleware of the dashboard.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Views
        .route("/api/preview", get(rest::preview))
        .route("/api/analysis", get(rest::analysis))
        .route("/api/analysis.txt", get(rest::analysis_text))
        // Operational endpoints
        .route("/health", get(rest::health_check))
        .route("/live", get(rest::liveness))
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct ApiServer {
    config: AppConfig,
}

impl ApiServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Start the HTTP server and serve until the process stops.
    pub async fn start_http(&self) -> anyhow::Result<()> {
        let state = AppState::new(&self.config.ingest.output_path, self.config.analysis.clone());
        let app = router(state);

        let addr = SocketAddr::new(self.config.api.host.parse()?, self.config.api.http_port);
        info!(
            addr = %addr,
            dataset = %self.config.ingest.output_path,
            "Starting dashboard server"
        );

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Start the Prometheus exporter on its own port. Must be called from
    /// within the Tokio runtime.
    pub fn start_metrics(&self) -> anyhow::Result<()> {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(SocketAddr::new(
                self.config.api.host.parse()?,
                self.config.metrics.port,
            ))
            .install()?;

        info!(port = self.config.metrics.port, "Metrics exporter started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use sms_core::config::AnalysisConfig;
    use sms_core::{Column, ColumnData, Dataset};
    use tower::ServiceExt;

    fn write_dataset(path: &std::path::Path) {
        let ds = Dataset::new(vec![
            Column::new(
                "Reply_rate",
                ColumnData::Float64(
                    [1.0, 1.0, 1.0, 1.0, 5.0, 5.0, 5.0, 5.0].into_iter().map(Some).collect(),
                ),
            ),
            Column::new(
                "SMS_content_length",
                ColumnData::Int64((1..=8).map(|i| Some(i * 10)).collect()),
            ),
            Column::new(
                "month",
                ColumnData::Utf8(vec![Some("2024-01".to_string()); 8]),
            ),
        ])
        .unwrap();
        sms_ingest::storage::write_parquet(path, &ds).unwrap();
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_missing_dataset_is_503() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(AppState::new(dir.path().join("none.parquet"), AnalysisConfig::default()));

        let (status, body) = get(app, "/api/analysis").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["error"], "dataset_unavailable");
    }

    #[tokio::test]
    async fn test_preview_and_analysis() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_sms_data.parquet");
        write_dataset(&path);
        let app = router(AppState::new(&path, AnalysisConfig::default()));

        let (status, body) = get(app.clone(), "/api/preview").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["shape"], "8 rows × 3 columns");

        let (status, body) = get(app.clone(), "/api/analysis").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["comparisons"].as_array().map(Vec::len), Some(12));
        assert_eq!(json["hypothesis_tests"][1]["status"], "ready");

        let (status, body) = get(app, "/api/analysis.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Multiple Comparison of Means - Tukey HSD"));
    }

    #[tokio::test]
    async fn test_health_and_live() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(AppState::new(dir.path().join("x.parquet"), AnalysisConfig::default()));

        let (status, body) = get(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["dataset_present"], false);

        let (status, _) = get(app, "/live").await;
        assert_eq!(status, StatusCode::OK);
    }
}
