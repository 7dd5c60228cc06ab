pub mod error;
pub mod health;
pub mod images;
pub mod metrics;
pub mod reading;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// Build the HTTP API. `/metrics` is only mounted when a Prometheus handle
/// is supplied.
pub fn router(
    state: AppState,
    prometheus: Option<Arc<PrometheusHandle>>,
    max_upload_bytes: usize,
) -> Router {
    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/health", get(health::health_check))
        .route("/api/palm-reading/start", post(reading::start_reading))
        .route(
            "/api/palm-reading/progress/{job_id}",
            get(reading::stream_progress),
        )
        .route(
            "/api/palm-reading/jobs/{job_id}",
            get(reading::get_job).delete(reading::delete_job),
        )
        .route("/api/images", post(images::upload_image))
        .route("/api/images/{id}", get(images::get_image))
        .with_state(state);

    if let Some(handle) = prometheus {
        app = app.route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(handle),
        );
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}
