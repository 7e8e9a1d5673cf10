//! HTTP surface: one POST route per analysis, each a single
//! extract → prompt → infer round trip.

use axum::{
    body::Bytes,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docbrief_core::{
    analyze, chat, extract_bytes, DocumentKind, DocumentQa, Embedder, LanguageModel,
    PipelineError, ReportKind,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const NO_PDF: &str = "No PDF file provided";
pub const NO_QUESTION: &str = "No question provided";

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn Embedder>,
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .route("/summary", post(summary))
        .route("/checklist", post(checklist))
        .route("/contract", post(contract))
        .route("/chat", post(chat_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{message}")]
    Upload { status: StatusCode, message: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upload { status, message } => {
                tracing::warn!(%status, %message, "rejected upload");
                *status
            }
            ApiError::Pipeline(error) => {
                tracing::error!(%error, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::Internal(error) => {
                tracing::error!(%error, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<MultipartError> for ApiError {
    fn from(error: MultipartError) -> Self {
        ApiError::Upload {
            status: error.status(),
            message: error.body_text(),
        }
    }
}

struct Upload {
    file_name: String,
    bytes: Bytes,
}

#[derive(Default)]
struct UploadForm {
    pdf: Option<Upload>,
    question: Option<String>,
}

impl UploadForm {
    async fn read(multipart: Result<Multipart, MultipartRejection>) -> Result<Self, ApiError> {
        let mut form = Self::default();
        let Ok(mut multipart) = multipart else {
            return Ok(form);
        };

        while let Some(field) = multipart.next_field().await? {
            match field.name() {
                Some("pdf") => {
                    let file_name = field.file_name().unwrap_or("upload.pdf").to_string();
                    let bytes = field.bytes().await?;
                    form.pdf = Some(Upload { file_name, bytes });
                }
                Some("question") => {
                    form.question = Some(field.text().await?);
                }
                _ => {}
            }
        }

        Ok(form)
    }

    fn take_pdf(&mut self) -> Result<Upload, ApiError> {
        self.pdf.take().ok_or(ApiError::BadRequest(NO_PDF))
    }

    fn take_question(&mut self) -> Result<String, ApiError> {
        self.question
            .take()
            .filter(|question| !question.trim().is_empty())
            .ok_or(ApiError::BadRequest(NO_QUESTION))
    }
}

async fn pdf_text(upload: Upload) -> Result<String, ApiError> {
    tracing::info!(file = %upload.file_name, bytes = upload.bytes.len(), "extracting upload");
    let document = tokio::task::spawn_blocking(move || {
        extract_bytes(&upload.file_name, DocumentKind::Pdf, &upload.bytes)
    })
    .await
    .map_err(|error| ApiError::Internal(error.to_string()))?
    .map_err(PipelineError::from)?;

    Ok(document.text())
}

async fn health() -> &'static str {
    "OK"
}

async fn ask(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let pdf = form.take_pdf()?;
    let question = form.take_question()?;

    let text = pdf_text(pdf).await?;
    let qa = DocumentQa::new(state.embedder.clone(), state.model.clone());
    let answer = qa.ask(&text, &question).await?;

    Ok(Json(json!({ "question": question, "answer": answer })))
}

async fn report(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
    kind: ReportKind,
) -> Result<Json<Value>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;
    let text = pdf_text(form.take_pdf()?).await?;
    let report = analyze(state.model.as_ref(), kind, &text).await?;

    let mut body = serde_json::Map::new();
    body.insert(kind.response_key().to_string(), Value::String(report));
    Ok(Json(Value::Object(body)))
}

async fn summary(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    report(state, multipart, ReportKind::BidSummary).await
}

async fn checklist(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    report(state, multipart, ReportKind::SubmissionChecklist).await
}

async fn contract(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, ApiError> {
    report(state, multipart, ReportKind::ContractRisks).await
}

#[derive(Debug, Default, Deserialize)]
struct ChatRequest {
    question: Option<String>,
}

async fn chat_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let request: ChatRequest = serde_json::from_slice(&body).unwrap_or_default();
    let question = request
        .question
        .filter(|question| !question.trim().is_empty())
        .ok_or(ApiError::BadRequest(NO_QUESTION))?;

    let answer = chat(state.model.as_ref(), &question).await?;
    Ok(Json(json!({ "question": question, "answer": answer })))
}
