// src/api.rs
//! HTTP surface: health, message/document detection, multipart upload, OCR status.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::analyze::{ClassificationPipeline, ClassificationResult};
use crate::error::DetectError;
use crate::ingest::{DocumentFormat, OcrClient, RawInput};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ClassificationPipeline>,
    pub ocr: Arc<OcrClient>,
    pub body_limit_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: Arc<ClassificationPipeline>, ocr: Arc<OcrClient>) -> Self {
        Self {
            pipeline,
            ocr,
            body_limit_bytes: 16 * 1024 * 1024,
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/detect", post(detect))
        .route("/upload", post(upload))
        .route("/ocr-status", get(ocr_status))
        .layer(DefaultBodyLimit::max(state.body_limit_bytes))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/* ----------------------------
Errors
---------------------------- */

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Detect(DetectError),
}

impl From<DetectError> for ApiError {
    fn from(e: DetectError) -> Self {
        ApiError::Detect(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Detect(e @ DetectError::UnsupportedFormat(_))
            | ApiError::Detect(e @ DetectError::Extraction { .. }) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Detect(e @ DetectError::ArtifactLoad(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        };
        tracing::warn!(status = status.as_u16(), error = %msg, "request rejected");
        (status, Json(json!({ "error": msg }))).into_response()
    }
}

/* ----------------------------
Handlers
---------------------------- */

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let model = state.pipeline.model();
    Json(json!({
        "status": "ok",
        "model": "logistic_regression",
        "vocabulary_size": model.vectorizer.len(),
        "threshold": model.threshold(),
        "normalizer_version": model.normalizer_version,
        "ocr_service": state.ocr.service_name(),
    }))
}

#[derive(Debug, Deserialize)]
struct DetectRequest {
    #[serde(default)]
    message: Option<String>,
    /// Base64 document bytes (a `data:...;base64,` prefix is accepted).
    #[serde(default)]
    file_content: Option<String>,
    #[serde(default)]
    file_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct DetectResponse {
    /// The text that was scored.
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<String>,
    #[serde(flatten)]
    result: ClassificationResult,
}

async fn detect(
    State(state): State<AppState>,
    body: Result<Json<DetectRequest>, JsonRejection>,
) -> Result<Json<DetectResponse>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let input = match (req.file_content, req.message) {
        (Some(content), _) => {
            let format = req
                .file_type
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| ApiError::BadRequest("`file_type` is required with `file_content`".into()))?;
            let bytes = decode_base64(&content)?;
            RawInput::Document { bytes, format }
        }
        (None, Some(message)) => RawInput::Message(message),
        (None, None) => {
            return Err(ApiError::BadRequest(
                "No message or file provided. Please send JSON with 'message' field or file content."
                    .into(),
            ))
        }
    };

    let (extracted, result) = state.pipeline.classify_with_text(&input).await?;
    Ok(Json(DetectResponse {
        message: extracted.text,
        filename: None,
        result,
    }))
}

async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DetectResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::BadRequest("No selected file".into()))?;
        // Validate before buffering the body.
        DocumentFormat::from_filename(&filename)?;
        let ext = filename
            .rsplit_once('.')
            .map(|(_, e)| e.to_string())
            .unwrap_or_default();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        let input = RawInput::Document {
            bytes: bytes.to_vec(),
            format: ext,
        };
        let (extracted, result) = state.pipeline.classify_with_text(&input).await?;
        return Ok(Json(DetectResponse {
            message: extracted.text,
            filename: Some(filename),
            result,
        }));
    }
    Err(ApiError::BadRequest("No file part in the request".into()))
}

async fn ocr_status(State(state): State<AppState>) -> Json<crate::ingest::ocr::OcrStatus> {
    Json(state.ocr.status())
}

fn decode_base64(content: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match content.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => content,
    };
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("Error processing file: invalid base64: {e}")))
}
