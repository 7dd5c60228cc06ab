use std::sync::Arc;

use crate::services::{
    analyzer::ImageAnalyzer,
    coordinator::JobCoordinator,
    image_store::ImageStore,
    job_store::JobStore,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,
    pub coordinator: JobCoordinator,
    pub images: Arc<ImageStore>,
}

impl AppState {
    pub fn new(
        jobs: Arc<JobStore>,
        analyzer: Arc<dyn ImageAnalyzer>,
        images: Arc<ImageStore>,
    ) -> Self {
        Self {
            coordinator: JobCoordinator::new(Arc::clone(&jobs), analyzer),
            jobs,
            images,
        }
    }
}
