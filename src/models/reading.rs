use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Response after submitting a photo for palm reading.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReadingResponse {
    pub job_id: Uuid,
}

/// Response after storing an uploaded image.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImageUploadResponse {
    pub id: Uuid,
    pub message: String,
}
