//! Minimal client for the Gemini `generateContent` REST endpoint.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const INVALID_KEY_MESSAGE: &str = "API key not valid";
const INVALID_KEY_REASON: &str = "API_KEY_INVALID";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API key rejected by the model service: {0}")]
    InvalidApiKey(String),

    #[error("model service returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("request to model service failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model service response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("model service returned no text")]
    EmptyResponse,
}

/// An image ready to be attached to a model request.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn to_part(&self) -> Part {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: self.mime_type.clone(),
                data: general_purpose::STANDARD.encode(&self.data),
            },
        }
    }
}

/// A multimodal model that answers a text prompt about one image.
#[async_trait]
pub trait CaptionModel: Send + Sync {
    async fn generate(
        &self,
        api_key: &str,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    pub fn new(prompt: &str, image: &InlineImage) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    image.to_part(),
                ],
            }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    InlineData { inline_data: InlineData },
    /// Part kinds this client never sends and does not read.
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } | Part::Other(_) => None,
            })
            .collect();
        Some(text)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

/// Maps a non-success reply from the service onto a [`GenerationError`].
pub fn classify_error(status: StatusCode, body: &str) -> GenerationError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());
    let key_rejected = parsed.as_ref().is_some_and(|e| {
        e.error
            .details
            .iter()
            .any(|d| d.reason.as_deref() == Some(INVALID_KEY_REASON))
    });

    if key_rejected || message.contains(INVALID_KEY_MESSAGE) || status == StatusCode::UNAUTHORIZED
    {
        GenerationError::InvalidApiKey(message)
    } else {
        GenerationError::Upstream {
            status: status.as_u16(),
            message,
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(500).collect()
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_base: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_base: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base, self.model
        )
    }
}

#[async_trait]
impl CaptionModel for GeminiClient {
    #[tracing::instrument(skip_all, fields(mime_type = %image.mime_type, bytes = image.data.len()))]
    async fn generate(
        &self,
        api_key: &str,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<String, GenerationError> {
        let payload = GenerateContentRequest::new(prompt, image);

        tracing::debug!(model = %self.model, "sending generateContent request");
        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        tracing::debug!(%status, body = %preview(&body), "model service replied");

        if !status.is_success() {
            return Err(classify_error(status, &body));
        }

        let result: GenerateContentResponse = serde_json::from_str(&body)?;
        result.text().ok_or(GenerationError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_prompt_and_inline_image() {
        let image = InlineImage::new("image/png", vec![0x89, b'P', b'N', b'G']);
        let request = GenerateContentRequest::new("describe", &image);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{
                    "parts": [
                        { "text": "describe" },
                        { "inlineData": { "mimeType": "image/png", "data": "iVBORw==" } }
                    ]
                }]
            })
        );
    }

    #[test]
    fn response_text_joins_text_parts_of_first_candidate() {
        let body = r#"{
            "candidates": [
                { "content": { "parts": [ { "text": "[\"a\"," }, { "text": "\"b\"]" } ], "role": "model" } },
                { "content": { "parts": [ { "text": "ignored" } ] } }
            ]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text().as_deref(), Some(r#"["a","b"]"#));
    }

    #[test]
    fn unknown_parts_are_skipped() {
        let body = r#"{
            "candidates": [
                { "content": { "parts": [ { "functionCall": { "name": "f" } }, { "text": "hi" } ] } }
            ]
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text().as_deref(), Some("hi"));
    }

    #[test]
    fn response_without_candidates_has_no_text() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.text(), None);
    }

    #[test]
    fn invalid_key_message_is_classified() {
        let body = r#"{
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        }"#;
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, body),
            GenerationError::InvalidApiKey(_)
        ));
    }

    #[test]
    fn invalid_key_reason_is_classified() {
        let body = r#"{
            "error": {
                "code": 400,
                "message": "bad key",
                "details": [ { "@type": "type.googleapis.com/google.rpc.ErrorInfo", "reason": "API_KEY_INVALID" } ]
            }
        }"#;
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, body),
            GenerationError::InvalidApiKey(_)
        ));
    }

    #[test]
    fn other_failures_stay_upstream_errors() {
        let body = r#"{ "error": { "code": 503, "message": "The model is overloaded." } }"#;
        match classify_error(StatusCode::SERVICE_UNAVAILABLE, body) {
            GenerationError::Upstream { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "The model is overloaded.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn forbidden_without_key_reason_is_not_a_key_rejection() {
        let body = r#"{
            "error": {
                "code": 403,
                "message": "Generative Language API has not been used in project 123 before or it is disabled.",
                "status": "PERMISSION_DENIED",
                "details": [ { "reason": "SERVICE_DISABLED" } ]
            }
        }"#;
        match classify_error(StatusCode::FORBIDDEN, body) {
            GenerationError::Upstream { status, .. } => assert_eq!(status, 403),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unauthorized_status_is_a_key_rejection() {
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, "denied"),
            GenerationError::InvalidApiKey(_)
        ));
    }

    #[test]
    fn non_json_error_body_is_kept_as_message() {
        match classify_error(StatusCode::BAD_GATEWAY, "upstream down") {
            GenerationError::Upstream { message, .. } => assert_eq!(message, "upstream down"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        let client = GeminiClient::new("http://localhost:9000/", "gemini-1.5-flash");
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }
}
