//! HTTP surface: `POST /generate-quiz` (multipart) and `GET /health`.

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tracing::{error, info, instrument, warn};

use crate::config::AppConfig;
use crate::context::{Document, DocumentKind};
use crate::error::QuizError;
use crate::pipeline::QuizPipeline;

/// `true` when the quiz has as many questions as were asked for.
pub const COMPLETE_HEADER: &str = "x-quiz-complete";

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<QuizPipeline>,
}

pub fn router(pipeline: Arc<QuizPipeline>, config: &AppConfig) -> Router {
    Router::new()
        .route("/generate-quiz", post(generate_quiz))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors(&config.cors_origins))
        .with_state(AppState { pipeline })
}

/// Exact-match origin allow-list. Unparseable entries are skipped.
fn cors(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(target: "rag_quiz::server", origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Bind and serve until ctrl-c.
pub async fn serve(pipeline: Arc<QuizPipeline>, config: &AppConfig) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(target: "rag_quiz::server", address = %config.bind_address, "listening");
    axum::serve(listener, router(pipeline, config))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!(target: "rag_quiz::server", "shutting down");
        })
        .await
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

#[instrument(target = "rag_quiz::server", skip_all)]
async fn generate_quiz(State(state): State<AppState>, multipart: Multipart) -> Result<Response, ApiError> {
    let (prompt, doc) = read_upload(multipart).await?;
    info!(target: "rag_quiz::server", filename = %doc.filename, bytes = doc.bytes.len(), "quiz requested");

    let report = state.pipeline.run(&doc, &prompt).await?;
    let complete = report.is_complete();

    let mut response = Json(report.quiz).into_response();
    response
        .headers_mut()
        .insert(COMPLETE_HEADER, HeaderValue::from_static(if complete { "true" } else { "false" }));
    Ok(response)
}

async fn read_upload(mut multipart: Multipart) -> Result<(String, Document), ApiError> {
    let mut prompt = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "prompt" => prompt = Some(field.text().await?),
            "file" => {
                let filename = field.file_name().map(str::to_string).filter(|f| !f.is_empty());
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?;
                file = Some((filename, content_type, bytes));
            }
            other => warn!(target: "rag_quiz::server", field = other, "ignoring unknown form field"),
        }
    }

    let prompt = prompt.ok_or_else(|| ApiError::bad_request("Missing form field: prompt"))?;
    let (filename, content_type, bytes) = file.ok_or_else(|| ApiError::bad_request("Missing form field: file"))?;
    let filename = filename.ok_or(QuizError::MissingFilename)?;

    let kind = match content_type.as_deref() {
        Some(ct) if ct != "application/octet-stream" => DocumentKind::from_content_type(ct)?,
        _ => DocumentKind::from_path(std::path::Path::new(&filename))?,
    };
    Ok((prompt, Document::new(filename, kind, bytes)))
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self { status: StatusCode::BAD_REQUEST, body: json!({ "error": message }) }
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        let status = match &err {
            QuizError::MissingFilename => StatusCode::BAD_REQUEST,
            QuizError::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            QuizError::BelowMinimumCount { minimum, .. } => {
                // Kept as a bare JSON string for existing clients.
                let message = format!("MINIMUM {} QUESTIONS ARE REQUIRED TO BE GENERATED", minimum);
                return Self { status: StatusCode::UNPROCESSABLE_ENTITY, body: Value::String(message) };
            }
            QuizError::AboveMaximumCount { .. } | QuizError::IntentUnresolved(_) | QuizError::DocumentLoad(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            QuizError::IntentTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            QuizError::Embedding(_) | QuizError::Ai(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            error!(target: "rag_quiz::server", error = %err, "request failed");
        } else {
            warn!(target: "rag_quiz::server", error = %err, "request rejected");
        }
        Self { status, body: json!({ "error": err.to_string() }) }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self { status: err.status(), body: json!({ "error": err.body_text() }) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
