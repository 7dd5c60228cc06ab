//! Test helper utilities for API tests against an in-process server

use std::sync::Arc;

use async_trait::async_trait;
use palm_reader::app_state::AppState;
use palm_reader::config::JobQueueConfig;
use palm_reader::models::analysis::{AnalysisOutcome, UploadedImage};
use palm_reader::models::job::JobSnapshot;
use palm_reader::routes;
use palm_reader::services::analyzer::{AnalysisError, ImageAnalyzer};
use palm_reader::services::image_store::ImageStore;
use palm_reader::services::job_store::JobStore;
use palm_reader::services::progress_bus::ProgressBus;
use reqwest::multipart;
use serde::Deserialize;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Smallest byte sequence `image::guess_format` accepts as PNG.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

/// What the fake analyzer answers once it is allowed to proceed.
#[derive(Clone, Copy)]
pub enum Verdict {
    NoHand,
    Hand,
    Fail,
}

/// Analyzer that waits for a permit before answering, so tests can attach
/// observers while a job is still in flight.
pub struct GatedAnalyzer {
    verdict: Verdict,
    gate: Arc<Semaphore>,
}

#[async_trait]
impl ImageAnalyzer for GatedAnalyzer {
    async fn analyze(&self, _image: &UploadedImage) -> Result<AnalysisOutcome, AnalysisError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| AnalysisError::Other(e.to_string()))?;
        permit.forget();

        match self.verdict {
            Verdict::NoHand => Ok(AnalysisOutcome::no_hand("No, that is a foot.")),
            Verdict::Hand => Ok(AnalysisOutcome::hand("Yes, palm lines visible.", None)),
            Verdict::Fail => Err(AnalysisError::Api {
                status: 500,
                body: "upstream exploded".to_string(),
            }),
        }
    }
}

pub struct TestApp {
    pub base_url: String,
    pub client: reqwest::Client,
    pub state: AppState,
    gate: Arc<Semaphore>,
}

impl TestApp {
    /// Let `n` pending analyzer calls finish.
    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }
}

/// Start the API on an ephemeral loopback port.
pub async fn spawn_app(verdict: Verdict, max_jobs: usize) -> TestApp {
    let gate = Arc::new(Semaphore::new(0));
    let analyzer = GatedAnalyzer {
        verdict,
        gate: Arc::clone(&gate),
    };

    let config = JobQueueConfig {
        max_jobs,
        ..Default::default()
    };
    let jobs = Arc::new(JobStore::new(config, ProgressBus::new()));
    let state = AppState::new(jobs, Arc::new(analyzer), Arc::new(ImageStore::new()));
    let app = routes::router(state.clone(), None, 10 * 1024 * 1024);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("No local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server error");
    });

    TestApp {
        base_url: format!("http://{}", addr),
        client: reqwest::Client::new(),
        state,
        gate,
    }
}

/// Response from POST /api/palm-reading/start
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub job_id: Uuid,
}

/// POST a photo as multipart field `image`.
pub async fn upload(
    app: &TestApp,
    path: &str,
    bytes: &[u8],
    mime: &str,
) -> reqwest::Response {
    let form = multipart::Form::new().part(
        "image",
        multipart::Part::bytes(bytes.to_vec())
            .file_name("hand.png")
            .mime_str(mime)
            .expect("Invalid mime type"),
    );

    app.client
        .post(format!("{}{}", app.base_url, path))
        .multipart(form)
        .send()
        .await
        .expect("Upload request failed")
}

pub async fn start_reading(app: &TestApp) -> Uuid {
    let response = upload(app, "/api/palm-reading/start", PNG_BYTES, "image/png").await;
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    response
        .json::<StartResponse>()
        .await
        .expect("Invalid start response")
        .job_id
}

pub async fn open_progress(app: &TestApp, job_id: Uuid) -> reqwest::Response {
    app.client
        .get(format!("{}/api/palm-reading/progress/{}", app.base_url, job_id))
        .send()
        .await
        .expect("Progress request failed")
}

/// Read an SSE body to the end and decode every `data:` line.
pub async fn read_snapshots(response: reqwest::Response) -> Vec<JobSnapshot> {
    let body = response.text().await.expect("Failed to read SSE body");
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).expect("Invalid snapshot JSON"))
        .collect()
}
