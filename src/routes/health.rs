use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub jobs: JobsHealth,
}

#[derive(Serialize)]
pub struct JobsHealth {
    pub live: usize,
    pub capacity: usize,
    pub stored_images: usize,
}

/// GET /health: Liveness plus in-memory occupancy.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        jobs: JobsHealth {
            live: state.jobs.len(),
            capacity: state.jobs.config().max_jobs,
            stored_images: state.images.len(),
        },
    })
}
