use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    response::{Html, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::ApiKeySource;
use crate::error::{CaptionError, CaptionResult};
use crate::gemini::{CaptionModel, InlineImage};
use crate::parser::parse_captions;
use crate::prompt::{caption_prompt, Platform};

const INDEX_HTML: &str = include_str!("../static/index.html");
const FALLBACK_MIME: &str = "application/octet-stream";

pub struct AppState {
    pub model: Arc<dyn CaptionModel>,
    pub api_key: ApiKeySource,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CaptionResponse {
    pub captions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api/caption", post(generate_captions))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Fields pulled out of the upload form.
#[derive(Debug, Default)]
struct UploadForm {
    image: Option<InlineImage>,
    platform: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> CaptionResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CaptionError::InvalidUpload(e.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => {
                let declared = field.content_type().map(str::to_owned);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| CaptionError::InvalidUpload(e.body_text()))?;
                if data.is_empty() {
                    continue;
                }
                let mime_type = resolve_mime_type(declared.as_deref(), &data);
                form.image = Some(InlineImage::new(mime_type, data.to_vec()));
            }
            Some("platform") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| CaptionError::InvalidUpload(e.body_text()))?;
                form.platform = Some(text);
            }
            _ => {}
        }
    }

    Ok(form)
}

/// Uses the declared part type when it names an image, otherwise sniffs the bytes.
fn resolve_mime_type(declared: Option<&str>, data: &[u8]) -> String {
    if let Some(mime) = declared.filter(|m| m.starts_with("image/")) {
        return mime.to_string();
    }
    image::guess_format(data)
        .ok()
        .and_then(format_mime_type)
        .unwrap_or(FALLBACK_MIME)
        .to_string()
}

fn format_mime_type(format: image::ImageFormat) -> Option<&'static str> {
    use image::ImageFormat;

    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        ImageFormat::Ico => Some("image/x-icon"),
        ImageFormat::Avif => Some("image/avif"),
        _ => None,
    }
}

#[tracing::instrument(skip_all, fields(platform = tracing::field::Empty))]
async fn generate_captions(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> CaptionResult<Json<CaptionResponse>> {
    let multipart = multipart.map_err(|e| CaptionError::InvalidUpload(e.body_text()))?;
    let form = read_form(multipart).await?;
    let image = form.image.ok_or(CaptionError::MissingImage)?;
    let platform = Platform::from_field(form.platform.as_deref());
    tracing::Span::current().record("platform", platform.as_str());

    let api_key = state.api_key.resolve().ok_or(CaptionError::MissingApiKey)?;

    tracing::info!(
        mime_type = %image.mime_type,
        bytes = image.data.len(),
        "generating captions"
    );
    let prompt = caption_prompt(&platform);
    let text = state.model.generate(&api_key, &prompt, &image).await?;

    let captions = parse_captions(&text)?;
    tracing::info!(count = captions.len(), "captions generated");

    Ok(Json(CaptionResponse { captions }))
}
