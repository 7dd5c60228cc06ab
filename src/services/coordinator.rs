//! Drives admitted jobs through the image analyzer.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::analysis::{AnalysisOutcome, UploadedImage};
use crate::models::job::JobUpdate;
use crate::services::analyzer::{AnalysisError, ImageAnalyzer};
use crate::services::job_store::{JobError, JobStore};

const MSG_DETECTING: &str = "Detecting hand in image";
const MSG_HAND_FOUND: &str = "Hand detected, reading palm lines";
const MSG_NO_HAND: &str = "No hand detected";
const MSG_ANALYZING_LINES: &str = "Analyzing palm lines";
const MSG_NO_HAND_DONE: &str = "Analysis complete";
const MSG_READING_DONE: &str = "Palm reading complete";
const MSG_FAILED: &str = "Failed to process palm reading";

/// How a single run ended, as far as the job store is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// The job was deleted or evicted before its terminal update landed.
    Abandoned,
}

/// Admits palm reading jobs and runs each one on its own task.
#[derive(Clone)]
pub struct JobCoordinator {
    store: Arc<JobStore>,
    analyzer: Arc<dyn ImageAnalyzer>,
}

impl JobCoordinator {
    pub fn new(store: Arc<JobStore>, analyzer: Arc<dyn ImageAnalyzer>) -> Self {
        Self { store, analyzer }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Admit a photo and start analyzing it in the background.
    ///
    /// Returns as soon as the job exists; progress is reported through the
    /// job store.
    pub fn submit(&self, image: UploadedImage) -> Result<Uuid, JobError> {
        self.submit_tracked(image).map(|(id, _)| id)
    }

    /// Like [`submit`](Self::submit), also handing back the run's task.
    pub fn submit_tracked(
        &self,
        image: UploadedImage,
    ) -> Result<(Uuid, JoinHandle<RunOutcome>), JobError> {
        let job_id = match self.store.create() {
            Ok(id) => id,
            Err(e) => {
                metrics::counter!("palm_jobs_rejected_total").increment(1);
                tracing::warn!(error = %e, "Rejected palm reading job");
                return Err(e);
            }
        };

        metrics::counter!("palm_jobs_submitted_total").increment(1);
        tracing::info!(
            job_id = %job_id,
            bytes = image.bytes.len(),
            content_type = %image.content_type,
            "Palm reading job admitted"
        );

        let coordinator = self.clone();
        let handle = tokio::spawn(async move { coordinator.run(job_id, image).await });

        Ok((job_id, handle))
    }

    /// Take one job from pending to a terminal state.
    async fn run(&self, job_id: Uuid, image: UploadedImage) -> RunOutcome {
        let start = Instant::now();

        let outcome = AssertUnwindSafe(self.process(job_id, &image))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(AnalysisError::Other("analyzer panicked".to_string())));

        let result = match outcome {
            Ok(Some(outcome)) => {
                metrics::counter!("palm_jobs_completed_total").increment(1);
                tracing::info!(
                    job_id = %job_id,
                    contains_hand = outcome.contains_hand,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Palm reading job completed"
                );
                RunOutcome::Completed
            }
            Ok(None) => RunOutcome::Abandoned,
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Palm reading job failed");
                if self.store.update(job_id, JobUpdate::failed(e.to_string(), MSG_FAILED)) {
                    metrics::counter!("palm_jobs_failed_total").increment(1);
                    RunOutcome::Failed
                } else {
                    RunOutcome::Abandoned
                }
            }
        };

        if result == RunOutcome::Abandoned {
            tracing::info!(job_id = %job_id, "Palm reading job removed before it finished");
        }
        metrics::histogram!("palm_job_duration_seconds").record(start.elapsed().as_secs_f64());

        result
    }

    /// The analysis phases. Each boundary is published through the store; the
    /// final `completed` update is applied here, failures by the caller.
    ///
    /// `Ok(None)` means the outcome was computed but the job no longer
    /// exists to record it.
    async fn process(
        &self,
        job_id: Uuid,
        image: &UploadedImage,
    ) -> Result<Option<AnalysisOutcome>, AnalysisError> {
        self.store.update(job_id, JobUpdate::processing(10, MSG_DETECTING));

        let detection = self.analyzer.analyze(image).await?;

        let message = if detection.contains_hand {
            MSG_HAND_FOUND
        } else {
            MSG_NO_HAND
        };
        self.store.update(job_id, JobUpdate::processing(50, message));

        if !detection.contains_hand {
            let recorded = self.store.update(
                job_id,
                JobUpdate::completed(detection.clone(), MSG_NO_HAND_DONE),
            );
            return Ok(recorded.then_some(detection));
        }

        self.store.update(job_id, JobUpdate::processing(75, MSG_ANALYZING_LINES));

        let reading = self.analyzer.refine(image, detection).await?;

        let recorded =
            self.store.update(job_id, JobUpdate::completed(reading.clone(), MSG_READING_DONE));

        Ok(recorded.then_some(reading))
    }
}
