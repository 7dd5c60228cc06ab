use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use palm_reader::app_state::AppState;
use palm_reader::config::AppConfig;
use palm_reader::routes;
use palm_reader::services::{
    image_store::{self, ImageStore},
    job_store::JobStore,
    progress_bus::ProgressBus,
    vision::VisionClient,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing palm-reader server");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    let queue_config = config.job_queue();
    tracing::info!(
        max_jobs = queue_config.max_jobs,
        retention_secs = queue_config.retention.as_secs(),
        aggressive_retention_secs = queue_config.aggressive_retention.as_secs(),
        sweep_interval_secs = queue_config.sweep_interval.as_secs(),
        "Starting in-memory job store"
    );
    let jobs = JobStore::spawn(queue_config, ProgressBus::new());

    let shutdown = CancellationToken::new();
    let images = Arc::new(ImageStore::new());
    image_store::spawn_retention(&images, config.image_retention(), shutdown.clone());

    tracing::info!(model = %config.vision_model, "Initializing vision client");
    let vision = VisionClient::new(
        &config.openai_base_url,
        &config.openai_api_key,
        &config.vision_model,
        config.vision_timeout(),
        Arc::clone(&images),
    )
    .expect("Failed to initialize vision client");

    let state = AppState::new(jobs, Arc::new(vision), images);
    let app = routes::router(state, Some(prometheus_handle), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
            shutdown.cancel();
        })
        .await
        .expect("Server error");
}
