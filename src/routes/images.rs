use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::reading::ImageUploadResponse;
use crate::routes::error::ApiError;
use crate::routes::reading::read_image;

/// POST /api/images: Store an uploaded image in memory.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ImageUploadResponse>), ApiError> {
    let image = read_image(&mut multipart).await?;
    let id = Uuid::new_v4();
    state.images.save(id, image.bytes, image.content_type);

    tracing::debug!(image_id = %id, "Image stored");

    Ok((
        StatusCode::CREATED,
        Json(ImageUploadResponse {
            id,
            message: "Image uploaded successfully".to_string(),
        }),
    ))
}

/// GET /api/images/{id}: Raw image bytes with their content type.
pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let image = state.images.get(id).ok_or(ApiError::ImageNotFound)?;
    Ok((
        [(header::CONTENT_TYPE, image.content_type)],
        image.bytes.to_vec(),
    ))
}
