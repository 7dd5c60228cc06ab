use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::{stream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::analysis::UploadedImage;
use crate::models::job::JobSnapshot;
use crate::models::reading::StartReadingResponse;
use crate::routes::error::ApiError;
use crate::services::job_store::{JobError, Watch};
use crate::services::progress_bus::Listener;

/// Pull the uploaded photo out of a multipart body.
///
/// Takes the field named `image`, or failing that the first field carrying a
/// file name. The bytes must be a recognizable JPEG, PNG or WebP image.
pub async fn read_image(multipart: &mut Multipart) -> Result<UploadedImage, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let is_image_field = field.name() == Some("image") || field.file_name().is_some();
        if !is_image_field {
            continue;
        }

        let declared = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let format = image::guess_format(&data).map_err(|_| ApiError::UnsupportedMediaType)?;
        let content_type = declared
            .filter(|ct| ct.starts_with("image/"))
            .unwrap_or_else(|| format.to_mime_type().to_string());

        return Ok(UploadedImage::new(data.to_vec(), content_type));
    }

    Err(ApiError::BadRequest("No image provided".to_string()))
}

/// POST /api/palm-reading/start: Upload a photo and start a palm reading.
pub async fn start_reading(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StartReadingResponse>), ApiError> {
    let image = read_image(&mut multipart).await?;
    let job_id = state.coordinator.submit(image)?;

    Ok((StatusCode::CREATED, Json(StartReadingResponse { job_id })))
}

/// GET /api/palm-reading/progress/{job_id}: Stream job snapshots over SSE.
///
/// The first event is the current snapshot. The stream ends after a terminal
/// snapshot, or right away if the job had already finished.
pub async fn stream_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (tx, rx) = mpsc::unbounded_channel::<JobSnapshot>();
    let listener: Listener = Arc::new(move |snapshot: &JobSnapshot| {
        // The receiver is gone once the client disconnects.
        let _ = tx.send(snapshot.clone());
    });

    let Watch {
        snapshot,
        subscription,
    } = state.jobs.watch(job_id, listener)?;

    tracing::debug!(
        job_id = %job_id,
        status = %snapshot.status,
        live = subscription.is_some(),
        "Progress stream opened"
    );

    // The bus drops the listener (and with it `tx`) when the topic closes,
    // which ends the stream. Dropping the stream early unsubscribes.
    let events = stream::once(async move { snapshot })
        .chain(UnboundedReceiverStream::new(rx))
        .map(move |snapshot| {
            let _live = &subscription;
            Ok(snapshot_event(&snapshot))
        });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn snapshot_event(snapshot: &JobSnapshot) -> Event {
    let data = serde_json::to_string(snapshot).unwrap_or_else(|_| "{}".to_string());
    Event::default().data(data)
}

/// GET /api/palm-reading/jobs/{job_id}: Current job snapshot.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<JobSnapshot>, ApiError> {
    state
        .jobs
        .get(job_id)
        .map(Json)
        .ok_or(ApiError::Job(JobError::NotFound(job_id)))
}

/// DELETE /api/palm-reading/jobs/{job_id}: Forget a job immediately.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.jobs.delete(job_id) {
        tracing::info!(job_id = %job_id, "Job deleted on request");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(JobError::NotFound(job_id).into())
    }
}
