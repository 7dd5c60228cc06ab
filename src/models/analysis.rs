use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of analyzing an uploaded hand photo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOutcome {
    /// Whether the photo shows the palm side of a hand with visible lines.
    pub contains_hand: bool,

    /// Free-text answer returned by the vision model.
    pub explanation: String,

    /// Image store id of the retained photo; only set when a hand was found.
    pub image_id: Option<Uuid>,
}

impl AnalysisOutcome {
    pub fn no_hand(explanation: impl Into<String>) -> Self {
        Self {
            contains_hand: false,
            explanation: explanation.into(),
            image_id: None,
        }
    }

    pub fn hand(explanation: impl Into<String>, image_id: Option<Uuid>) -> Self {
        Self {
            contains_hand: true,
            explanation: explanation.into(),
            image_id,
        }
    }
}

/// Raw photo bytes plus the content type reported by the uploader.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl UploadedImage {
    pub fn new(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: content_type.into(),
        }
    }
}
