use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::gemini::GenerationError;
use crate::parser::ParseError;

pub type CaptionResult<T> = std::result::Result<T, CaptionError>;

#[derive(Error, Debug)]
pub enum CaptionError {
    #[error("No image file uploaded.")]
    MissingImage,

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("API key is missing. Please provide your own key or configure one on the server.")]
    MissingApiKey,

    /// Carries the model service's own rejection text for logging.
    #[error("The provided API key is not valid. Please check your key and try again.")]
    InvalidApiKey(String),

    #[error("Failed to generate caption.")]
    Generation(#[source] GenerationError),

    #[error("Failed to parse generated captions.")]
    Parse(#[from] ParseError),
}

impl From<GenerationError> for CaptionError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::InvalidApiKey(detail) => CaptionError::InvalidApiKey(detail),
            other => CaptionError::Generation(other),
        }
    }
}

impl CaptionError {
    pub fn status(&self) -> StatusCode {
        match self {
            CaptionError::MissingImage
            | CaptionError::InvalidUpload(_)
            | CaptionError::MissingApiKey => StatusCode::BAD_REQUEST,
            CaptionError::InvalidApiKey(_) => StatusCode::UNAUTHORIZED,
            CaptionError::Generation(_) | CaptionError::Parse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for CaptionError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "caption request failed");
        } else {
            tracing::warn!(error = ?self, "caption request rejected");
        }
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
