use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use uuid::Uuid;

use crate::models::analysis::{AnalysisOutcome, UploadedImage};
use crate::services::analyzer::{AnalysisError, ImageAnalyzer};
use crate::services::image_store::ImageStore;

const PALM_DETECTION_PROMPT: &str = concat!(
    "Does this image show the inner view (palm side) of a human hand with clearly visible ",
    "palm lines? The image must show: 1) The palm surface (not the back of hand), ",
    "2) Clear palm lines (heart line, head line, life line, etc.), ",
    "3) The entire palm area visible. The image may contain other elements in the ",
    "background or frame, but a clear palm must be prominently visible. ",
    "Answer with only 'yes' or 'no' and provide a brief explanation."
);

const MAX_TOKENS: u32 = 100;

/// Client for an OpenAI-compatible chat completions endpoint with vision
/// support. Photos that show a hand are kept in the [`ImageStore`].
pub struct VisionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    images: Arc<ImageStore>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl VisionClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout: Duration,
        images: Arc<ImageStore>,
    ) -> Result<Self, AnalysisError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            images,
        })
    }

    /// Ask the model whether the photo shows a palm and return its answer.
    async fn ask(&self, image: &UploadedImage) -> Result<String, AnalysisError> {
        let url = format!("{}/chat/completions", self.base_url);
        let data_url = format!(
            "data:{};base64,{}",
            image.content_type,
            base64::engine::general_purpose::STANDARD.encode(&image.bytes)
        );

        let request_body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": PALM_DETECTION_PROMPT },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }],
            "max_tokens": MAX_TOKENS
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(AnalysisError::EmptyResponse)
    }
}

/// A "yes" anywhere in the model's answer counts as a detected palm.
pub fn answer_contains_hand(answer: &str) -> bool {
    answer.to_lowercase().contains("yes")
}

#[async_trait]
impl ImageAnalyzer for VisionClient {
    async fn analyze(&self, image: &UploadedImage) -> Result<AnalysisOutcome, AnalysisError> {
        let image_id = Uuid::new_v4();
        self.images
            .save(image_id, image.bytes.as_slice(), image.content_type.as_str());

        let answer = match self.ask(image).await {
            Ok(answer) => answer,
            Err(e) => {
                self.images.delete(image_id);
                return Err(e);
            }
        };

        if answer_contains_hand(&answer) {
            tracing::debug!(image_id = %image_id, "Vision model found a palm");
            Ok(AnalysisOutcome::hand(answer, Some(image_id)))
        } else {
            self.images.delete(image_id);
            Ok(AnalysisOutcome::no_hand(answer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_parsing() {
        assert!(answer_contains_hand("Yes. The palm lines are clearly visible."));
        assert!(answer_contains_hand("yes"));
        assert!(!answer_contains_hand("No, this is the back of a hand."));
        assert!(!answer_contains_hand(""));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = VisionClient::new(
            "https://api.example.com/v1/",
            "sk-test",
            "gpt-4o-mini",
            Duration::from_secs(5),
            Arc::new(ImageStore::new()),
        )
        .unwrap();
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }
}
