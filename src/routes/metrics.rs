use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

/// Install the global Prometheus recorder and describe the job metrics.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    metrics::describe_counter!("palm_jobs_submitted_total", "Palm reading jobs admitted");
    metrics::describe_counter!(
        "palm_jobs_rejected_total",
        "Palm reading jobs refused because the store was full"
    );
    metrics::describe_counter!("palm_jobs_completed_total", "Palm reading jobs completed");
    metrics::describe_counter!("palm_jobs_failed_total", "Palm reading jobs that failed");
    metrics::describe_histogram!(
        "palm_job_duration_seconds",
        "Time from admission to terminal state"
    );
    metrics::describe_gauge!("palm_jobs_live", "Jobs currently held in memory");

    Ok(handle)
}

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}
