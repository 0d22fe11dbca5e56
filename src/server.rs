//! JSON HTTP API over [`Assistant`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/sessions` | List sessions, newest first |
//! | `POST`   | `/sessions` | Create a session (`{"name": ...}` optional) |
//! | `GET`    | `/sessions/current?id=` | Requested session, else most recent, else a new one |
//! | `GET`    | `/sessions/{id}` | Session with contract metadata |
//! | `PATCH`  | `/sessions/{id}` | Rename (`{"name": ...}`) |
//! | `DELETE` | `/sessions/{id}` | Delete session, contract and transcript |
//! | `PUT`    | `/sessions/{id}/contract?filename=` | Upload the raw PDF body |
//! | `POST`   | `/sessions/{id}/overview` | Overview report (`{"regenerate": true}` optional) |
//! | `POST`   | `/sessions/{id}/risks` | Risk report (`{"regenerate": true}` optional) |
//! | `GET`    | `/sessions/{id}/messages` | Chat transcript |
//! | `POST`   | `/sessions/{id}/messages` | Ask a question (`{"content": ...}`) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "session not found: 42" } }
//! ```
//!
//! Error codes: `bad_request` (400), `embeddings_disabled` (400),
//! `not_found` (404), `conflict` (409), `upstream` (502), `internal` (500).
//! Bodies over `[server].max_upload_bytes` are refused with a plain 413.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! can be served from anywhere.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::assistant::{Assistant, SessionDetails};
use crate::config::Config;
use crate::error::AssistantError;
use crate::models::{ChatMessage, Contract, Session};

const DEFAULT_UPLOAD_NAME: &str = "contract.pdf";

/// Starts the HTTP server on `[server].bind` and runs until the process
/// is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let assistant = Assistant::from_config(config.clone()).await?;
    let app = router(assistant);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    println!("Contracts server listening on http://{}", bind_addr);
    tracing::info!(bind = %bind_addr, "server started");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the application router.
pub fn router(assistant: Assistant) -> Router {
    let max_upload = assistant.config().server.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sessions", get(handle_list_sessions).post(handle_create_session))
        .route("/sessions/current", get(handle_current_session))
        .route(
            "/sessions/{id}",
            get(handle_get_session)
                .patch(handle_rename_session)
                .delete(handle_delete_session),
        )
        .route("/sessions/{id}/contract", put(handle_upload_contract))
        .route("/sessions/{id}/overview", post(handle_overview))
        .route("/sessions/{id}/risks", post(handle_risks))
        .route(
            "/sessions/{id}/messages",
            get(handle_history).post(handle_chat),
        )
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(assistant)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        let message = err.to_string();
        match err {
            AssistantError::SessionNotFound(_) | AssistantError::NoContract(_) => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", message)
            }
            AssistantError::ContractExists(_) => {
                AppError::new(StatusCode::CONFLICT, "conflict", message)
            }
            AssistantError::EmptyDocument(_)
            | AssistantError::InvalidInput(_)
            | AssistantError::Extract(_) => bad_request(message),
            AssistantError::EmbeddingsDisabled => {
                AppError::new(StatusCode::BAD_REQUEST, "embeddings_disabled", message)
            }
            AssistantError::Provider(_) => {
                tracing::warn!(error = %message, "model provider failed");
                AppError::new(StatusCode::BAD_GATEWAY, "upstream", message)
            }
            AssistantError::Database(_) | AssistantError::Other(_) => {
                tracing::error!(error = %message, "request failed");
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
            }
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Sessions ============

#[derive(Serialize)]
struct SessionListResponse {
    sessions: Vec<Session>,
}

async fn handle_list_sessions(State(assistant): State<Assistant>) -> ApiResult<SessionListResponse> {
    let sessions = assistant.list_sessions().await?;
    Ok(Json(SessionListResponse { sessions }))
}

#[derive(Deserialize, Default)]
struct CreateSessionRequest {
    name: Option<String>,
}

async fn handle_create_session(
    State(assistant): State<Assistant>,
    body: Bytes,
) -> Result<(StatusCode, Json<Session>), AppError> {
    let request: CreateSessionRequest = parse_optional_body(&body)?;
    let session = assistant.create_session(request.name.as_deref()).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

#[derive(Deserialize)]
struct CurrentSessionQuery {
    id: Option<String>,
}

async fn handle_current_session(
    State(assistant): State<Assistant>,
    Query(query): Query<CurrentSessionQuery>,
) -> ApiResult<Session> {
    Ok(Json(assistant.current_session(query.id.as_deref()).await?))
}

async fn handle_get_session(
    State(assistant): State<Assistant>,
    Path(id): Path<String>,
) -> ApiResult<SessionDetails> {
    Ok(Json(assistant.session_details(&id).await?))
}

#[derive(Deserialize)]
struct RenameSessionRequest {
    name: String,
}

async fn handle_rename_session(
    State(assistant): State<Assistant>,
    Path(id): Path<String>,
    payload: Result<Json<RenameSessionRequest>, JsonRejection>,
) -> ApiResult<Session> {
    let Json(request) = payload?;
    Ok(Json(assistant.rename_session(&id, &request.name).await?))
}

async fn handle_delete_session(
    State(assistant): State<Assistant>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    assistant.delete_session(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============ PUT /sessions/{id}/contract ============

#[derive(Deserialize)]
struct UploadQuery {
    filename: Option<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    session: Session,
    contract_id: i64,
    filename: String,
    characters: usize,
}

async fn handle_upload_contract(
    State(assistant): State<Assistant>,
    Path(id): Path<String>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    if body.is_empty() {
        return Err(bad_request("request body must contain the PDF file"));
    }
    let filename = query
        .filename
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());

    let contract: Contract = assistant
        .upload_contract(&id, &filename, body.to_vec())
        .await?;
    let session = assistant.session(&id).await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            session,
            contract_id: contract.id,
            filename: contract.filename,
            characters: contract.content.chars().count(),
        }),
    ))
}

// ============ Reports ============

#[derive(Deserialize, Default)]
struct ReportRequest {
    #[serde(default)]
    regenerate: bool,
}

#[derive(Serialize)]
struct ReportResponse {
    session_id: String,
    report: String,
}

async fn handle_overview(
    State(assistant): State<Assistant>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ReportResponse> {
    let request: ReportRequest = parse_optional_body(&body)?;
    let report = assistant.overview(&id, request.regenerate).await?;
    Ok(Json(ReportResponse {
        session_id: id,
        report,
    }))
}

async fn handle_risks(
    State(assistant): State<Assistant>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<ReportResponse> {
    let request: ReportRequest = parse_optional_body(&body)?;
    let report = assistant.risks(&id, request.regenerate).await?;
    Ok(Json(ReportResponse {
        session_id: id,
        report,
    }))
}

// ============ Chat ============

#[derive(Serialize)]
struct HistoryResponse {
    messages: Vec<ChatMessage>,
}

async fn handle_history(
    State(assistant): State<Assistant>,
    Path(id): Path<String>,
) -> ApiResult<HistoryResponse> {
    let messages = assistant.history(&id).await?;
    Ok(Json(HistoryResponse { messages }))
}

#[derive(Deserialize)]
struct ChatRequest {
    content: String,
}

async fn handle_chat(
    State(assistant): State<Assistant>,
    Path(id): Path<String>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult<ChatMessage> {
    let Json(request) = payload?;
    Ok(Json(assistant.chat(&id, &request.content).await?))
}

/// An empty body means "all defaults"; anything else must be valid JSON.
fn parse_optional_body<T>(body: &[u8]) -> Result<T, AppError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| bad_request(format!("invalid JSON body: {}", e)))
}
