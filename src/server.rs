//! HTTP server.
//!
//! Exposes ingest, question answering, session history, and document
//! inspection as a JSON API. Every collaborator is built once at startup
//! and shared by all handlers through [`AppState`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (version, embedding model, generator) |
//! | `POST`   | `/ingest/upload` | Multipart upload: `file`, optional `strategy`, `size`, `overlap` |
//! | `POST`   | `/rag/query` | `{session_id, query, top_k?}` → `{answer, sources}` |
//! | `GET`    | `/rag/history/{session_id}` | Retained turns, oldest first |
//! | `DELETE` | `/rag/history/{session_id}` | Drop a session's history |
//! | `GET`    | `/documents/{id}` | Document with its chunks |
//! | `DELETE` | `/documents/{id}` | Remove a document, its chunks, and vectors |
//! | `GET`    | `/booking/` | Booking service info |
//! | `POST`   | `/booking/create` | `{name, email, date, time}` → stored booking |
//! | `GET`    | `/booking/list` | Array of all bookings, newest first |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "size must be between 50 and 2000" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `extraction_failed` (422),
//! `provider_error` (502), `timeout` (504), `memory_error` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::app;
use crate::booking::{Booking, BookingStore, NewBooking};
use crate::config::Config;
use crate::error::RagError;
use crate::get::DocumentResponse;
use crate::models::{ChatTurn, ChunkingParams, IngestOutcome, QueryAnswer, QueryRequest};
use crate::pipeline::RagPipeline;

/// Largest accepted upload body.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<RagPipeline>,
    bookings: BookingStore,
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is
/// terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let services = app::build_services(config).await?;

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "server listening");
    println!("ragd listening on http://{}", bind_addr);

    axum::serve(
        listener,
        router(Arc::new(services.pipeline), services.bookings),
    )
    .await?;
    Ok(())
}

/// Build the router over an existing pipeline and booking store.
pub fn router(pipeline: Arc<RagPipeline>, bookings: BookingStore) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ingest/upload", post(handle_upload))
        .route("/rag/query", post(handle_query))
        .route(
            "/rag/history/{session_id}",
            get(handle_history).delete(handle_clear_history),
        )
        .route(
            "/documents/{id}",
            get(handle_get_document).delete(handle_delete_document),
        )
        .route("/booking/", get(handle_booking_info))
        .route("/booking/create", post(handle_create_booking))
        .route("/booking/list", get(handle_list_bookings))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(AppState { pipeline, bookings })
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    /// Human-readable error message.
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

impl From<RagError> for AppError {
    fn from(err: RagError) -> Self {
        let (status, code) = match &err {
            RagError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            RagError::Extraction(_) => (StatusCode::UNPROCESSABLE_ENTITY, "extraction_failed"),
            RagError::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider_error"),
            RagError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            RagError::Memory(_) => (StatusCode::INTERNAL_SERVER_ERROR, "memory_error"),
            RagError::Storage(_) | RagError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        if !err.is_client_fault() {
            tracing::error!(code, error = %err, "request failed");
        }
        AppError {
            status,
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    embedding: String,
    generator: String,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        embedding: state.pipeline.embedder_name().to_string(),
        generator: state.pipeline.generator_name().to_string(),
    })
}

// ============ POST /ingest/upload ============

struct Upload {
    filename: String,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

/// Handler for `POST /ingest/upload`.
///
/// Form fields other than `file` fall back to the `[chunking]` defaults.
async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestOutcome>, AppError> {
    let mut params: ChunkingParams = state.pipeline.settings().chunking;
    let mut upload: Option<Upload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(e.to_string()))?;
                upload = Some(Upload {
                    filename,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            "strategy" | "size" | "overlap" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| bad_request(e.to_string()))?;
                let value = value.trim();
                match name.as_str() {
                    "strategy" => params.strategy = value.parse()?,
                    "size" => params.size = parse_number("size", value)?,
                    _ => params.overlap = parse_number("overlap", value)?,
                }
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| bad_request("missing 'file' field"))?;
    let outcome = state
        .pipeline
        .ingest_bytes(
            upload.bytes,
            &upload.filename,
            upload.content_type.as_deref(),
            params,
        )
        .await?;
    Ok(Json(outcome))
}

fn parse_number(field: &str, value: &str) -> Result<usize, AppError> {
    value
        .parse()
        .map_err(|_| bad_request(format!("{} must be a non-negative integer", field)))
}

// ============ POST /rag/query ============

async fn handle_query(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryAnswer>, AppError> {
    Ok(Json(state.pipeline.query(&request).await?))
}

// ============ /rag/history/{session_id} ============

#[derive(Serialize)]
struct HistoryResponse {
    session_id: String,
    messages: Vec<ChatTurn>,
}

async fn handle_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<HistoryResponse>, AppError> {
    let messages = state.pipeline.history(&session_id).await?;
    Ok(Json(HistoryResponse {
        session_id,
        messages,
    }))
}

async fn handle_clear_history(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.pipeline.clear_history(&session_id).await?;
    Ok(Json(
        serde_json::json!({ "session_id": session_id, "cleared": true }),
    ))
}

// ============ /documents/{id} ============

async fn handle_get_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    match state.pipeline.get_document(&id).await? {
        Some(record) => Ok(Json(record.into())),
        None => Err(not_found(format!("document not found: {}", id))),
    }
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !state.pipeline.delete_document(&id).await? {
        return Err(not_found(format!("document not found: {}", id)));
    }
    Ok(Json(serde_json::json!({ "document_id": id, "deleted": true })))
}

// ============ /booking ============

async fn handle_booking_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "booking",
        "endpoints": ["POST /booking/create", "GET /booking/list"],
    }))
}

async fn handle_create_booking(
    State(state): State<AppState>,
    Json(request): Json<NewBooking>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.bookings.create(&request).await?))
}

async fn handle_list_bookings(
    State(state): State<AppState>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.list().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Stage;

    #[test]
    fn test_error_mapping() {
        let cases = [
            (RagError::invalid("bad"), StatusCode::BAD_REQUEST, "bad_request"),
            (
                RagError::Extraction("no text".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "extraction_failed",
            ),
            (
                RagError::provider(Stage::Generate, anyhow::anyhow!("down")),
                StatusCode::BAD_GATEWAY,
                "provider_error",
            ),
            (
                RagError::Timeout {
                    stage: Stage::VectorQuery,
                    secs: 30,
                },
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
            ),
            (
                RagError::Memory(anyhow::anyhow!("locked")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "memory_error",
            ),
            (
                RagError::Storage(anyhow::anyhow!("disk")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
            ),
        ];
        for (err, status, code) in cases {
            let app_err = AppError::from(err);
            assert_eq!(app_err.status, status);
            assert_eq!(app_err.code, code);
        }
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("size", "200").unwrap(), 200);
        let err = parse_number("size", "-1").unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("size"));
    }
}
