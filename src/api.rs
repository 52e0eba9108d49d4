//! HTTP surface for docqna.
//!
//! This module exposes a compact Axum router:
//!
//! - `POST /documents` – Multipart upload of one or more PDF `file` parts. Each file is extracted,
//!   chunked, and summarized; the response carries one report per file
//!   (`processed` | `skipped` | `failed`).
//! - `GET /documents` – Stored chunks with summaries and token counts, plus the total.
//! - `PUT /documents/summary` – Replace the summary of one chunk.
//! - `POST /ask` – Answer a question from the most relevant chunk.
//! - `GET /settings` / `PATCH /settings` – Inspect or edit agent and chunking settings.
//! - `GET /status` – Documents loaded, model deployment, and total tokens.
//! - `GET /metrics` – Upload and question counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools.

use crate::metrics::MetricsSnapshot;
use crate::processing::{
    AnswerOutcome, AskError, DocumentView, FileReport, QnaApi, ServiceError, SessionError,
    SettingsView, StatusSnapshot, Upload,
};
use crate::settings::{SettingsError, SettingsUpdate};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Largest accepted upload request body.
pub const MAX_UPLOAD_BYTES: usize = 200 * 1024 * 1024;

/// Multipart field name carrying uploaded files.
const FILE_FIELD: &str = "file";

/// Build the HTTP router exposing the question-answering API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: QnaApi + 'static,
{
    Router::new()
        .route(
            "/documents",
            get(list_documents::<S>)
                .post(upload_documents::<S>)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/documents/summary", put(update_summary::<S>))
        .route("/ask", post(ask_question::<S>))
        .route(
            "/settings",
            get(get_settings::<S>).patch(update_settings::<S>),
        )
        .route("/status", get(get_status::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// Response body for `POST /documents`.
#[derive(Serialize)]
struct UploadResponse {
    files: Vec<FileReport>,
}

/// Read every `file` part of the multipart body and hand the batch to the pipeline.
///
/// A part that cannot be read is reported as failed; the remaining parts are still processed.
async fn upload_documents<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: QnaApi,
{
    let mut uploads = Vec::new();
    let mut unreadable = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(format!("Failed to read multipart field: {err}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("upload_{}.pdf", uuid::Uuid::new_v4()));
        match field.bytes().await {
            Ok(bytes) => uploads.push(Upload {
                file_name,
                bytes: bytes.to_vec(),
            }),
            Err(err) => {
                tracing::warn!(file = %file_name, error = %err, "Failed to read uploaded file");
                unreadable.push(FileReport {
                    file_name,
                    outcome: crate::processing::FileOutcome::Failed {
                        error: format!("Failed to read file: {err}"),
                    },
                });
            }
        }
    }

    if uploads.is_empty() && unreadable.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Request contained no '{FILE_FIELD}' parts"
        )));
    }

    let mut files = service.ingest_files(uploads).await;
    files.extend(unreadable);
    tracing::info!(files = files.len(), "Upload request completed");
    Ok(Json(UploadResponse { files }))
}

/// Response body for `GET /documents`.
#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentView>,
    total_tokens: usize,
}

async fn list_documents<S>(State(service): State<Arc<S>>) -> Json<DocumentsResponse>
where
    S: QnaApi,
{
    let documents = service.documents().await;
    let total_tokens = documents.iter().map(|doc| doc.token_count).sum();
    Json(DocumentsResponse {
        documents,
        total_tokens,
    })
}

/// Request body for `PUT /documents/summary`.
#[derive(Deserialize)]
struct SummaryEditRequest {
    /// Chunk whose summary is replaced.
    name: String,
    /// New summary text.
    summary: String,
}

async fn update_summary<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SummaryEditRequest>,
) -> Result<StatusCode, AppError>
where
    S: QnaApi,
{
    service
        .update_summary(&request.name, request.summary)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

async fn ask_question<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AnswerOutcome>, AppError>
where
    S: QnaApi,
{
    let outcome = service.ask(&request.question).await?;
    Ok(Json(outcome))
}

async fn get_settings<S>(State(service): State<Arc<S>>) -> Json<SettingsView>
where
    S: QnaApi,
{
    Json(service.settings_view().await)
}

/// Request body for `PATCH /settings`.
#[derive(Deserialize)]
struct SettingsEditRequest {
    /// `document_processing` or an agent section.
    section: String,
    /// Field within the section.
    key: String,
    /// New value; its JSON type must match the field.
    value: serde_json::Value,
}

async fn update_settings<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<SettingsEditRequest>,
) -> Result<Json<SettingsView>, AppError>
where
    S: QnaApi,
{
    let update = SettingsUpdate::from_parts(&request.section, &request.key, &request.value)?;
    let view = service.update_settings(update).await?;
    tracing::info!(
        section = %request.section,
        key = %request.key,
        "Setting updated"
    );
    Ok(Json(view))
}

async fn get_status<S>(State(service): State<Arc<S>>) -> Json<StatusSnapshot>
where
    S: QnaApi,
{
    Json(service.status().await)
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: QnaApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery in tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/documents",
                description: "Upload PDF files as multipart 'file' parts. Each file is extracted, split into token-bounded chunks, and summarized; already processed file names are skipped.",
                request_example: None,
            },
            CommandDescriptor {
                name: "documents",
                method: "GET",
                path: "/documents",
                description: "List stored chunks with their summaries and token counts.",
                request_example: None,
            },
            CommandDescriptor {
                name: "edit_summary",
                method: "PUT",
                path: "/documents/summary",
                description: "Replace the summary used to score a chunk's relevance.",
                request_example: Some(json!({
                    "name": "report.pdf (Part 1/2)",
                    "summary": "Quarterly revenue figures by region."
                })),
            },
            CommandDescriptor {
                name: "ask",
                method: "POST",
                path: "/ask",
                description: "Answer a question from the most relevant chunk. Response returns { \"answer\", \"source\", \"relevance_score\", \"scores\" }.",
                request_example: Some(json!({ "question": "What was revenue in Q3?" })),
            },
            CommandDescriptor {
                name: "settings",
                method: "GET",
                path: "/settings",
                description: "Return chunking and agent settings with model details (API key redacted).",
                request_example: None,
            },
            CommandDescriptor {
                name: "edit_setting",
                method: "PATCH",
                path: "/settings",
                description: "Edit one setting; the change is validated and persisted.",
                request_example: Some(json!({
                    "section": "reply_agent",
                    "key": "temperature",
                    "value": 0.2
                })),
            },
            CommandDescriptor {
                name: "status",
                method: "GET",
                path: "/status",
                description: "Return documents loaded, model deployment, and total tokens.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return upload and question counters.",
                request_example: None,
            },
        ],
    })
}

enum AppError {
    BadRequest(String),
    NotFound(String),
    BadGateway(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::BadGateway(message) => {
                tracing::error!(error = %message, "Language model call failed");
                (StatusCode::BAD_GATEWAY, message)
            }
            AppError::Internal(message) => {
                tracing::error!(error = %message, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, message)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AskError> for AppError {
    fn from(inner: AskError) -> Self {
        match inner {
            AskError::EmptyQuestion | AskError::NoDocuments => Self::BadRequest(inner.to_string()),
            AskError::Relevance(_) | AskError::Reply(_) => Self::BadGateway(inner.to_string()),
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(inner: SettingsError) -> Self {
        match inner {
            SettingsError::UnknownField { .. }
            | SettingsError::InvalidType { .. }
            | SettingsError::OutOfRange { .. } => Self::BadRequest(inner.to_string()),
            SettingsError::Io { .. } | SettingsError::Malformed { .. } => {
                Self::Internal(inner.to_string())
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(inner: ServiceError) -> Self {
        match inner {
            ServiceError::Session(err @ SessionError::UnknownDocument(_)) => {
                Self::NotFound(err.to_string())
            }
            ServiceError::Session(err) => Self::BadRequest(err.to_string()),
            ServiceError::Settings(err) => err.into(),
        }
    }
}
