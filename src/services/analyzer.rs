use async_trait::async_trait;

use crate::models::analysis::{AnalysisOutcome, UploadedImage};

/// Image analysis backend driven by the job coordinator.
///
/// A single call is treated as atomic: it either yields an outcome or an
/// error, and the coordinator does not retry.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// First phase: decide whether the photo shows a readable palm.
    async fn analyze(&self, image: &UploadedImage) -> Result<AnalysisOutcome, AnalysisError>;

    /// Second phase, only run when a hand was found. Returns the combined
    /// outcome stored as the job result.
    async fn refine(
        &self,
        _image: &UploadedImage,
        outcome: AnalysisOutcome,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        Ok(outcome)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Vision API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Vision API returned no answer")]
    EmptyResponse,

    #[error("Analysis failed: {0}")]
    Other(String),
}
