//! Session endpoints
//!
//! CRUD over the caller's chat sessions plus message append, which runs
//! the eviction policy and reports how many sessions were cleared.

use crate::providers::Citation;
use crate::server::{ApiError, AppState, Authenticated};
use crate::sessions::{ChatMessage, Role, StoredAttachment};
use crate::tools::ToolCallRecord;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

/// `GET /api/sessions` - summaries, most recently updated first
pub async fn list(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
) -> std::result::Result<Response, ApiError> {
    let summaries = state.sessions.list(&user.id)?;
    Ok(Json(summaries).into_response())
}

/// Create request body
#[derive(Debug, Default, Deserialize)]
pub struct CreateBody {
    #[serde(default)]
    title: Option<String>,
}

/// `POST /api/sessions`
pub async fn create(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    body: Option<Json<CreateBody>>,
) -> std::result::Result<Response, ApiError> {
    let title = body.and_then(|Json(b)| b.title);
    let session = state.sessions.create(&user.id, title)?;
    Ok((StatusCode::CREATED, Json(session)).into_response())
}

/// `GET /api/sessions/{id}`
pub async fn get_one(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> std::result::Result<Response, ApiError> {
    match state.sessions.get(&user.id, &id)? {
        Some(session) => Ok(Json(session).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "message": format!("Not found: session {}", id) })),
        )
            .into_response()),
    }
}

/// `DELETE /api/sessions/{id}`
pub async fn remove(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
) -> std::result::Result<Response, ApiError> {
    state.sessions.delete(&user.id, &id)?;
    Ok(Json(json!({ "success": true })).into_response())
}

/// Append request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendBody {
    role: Role,
    content: String,
    #[serde(default)]
    attachments: Vec<StoredAttachment>,
    #[serde(default)]
    tool_calls: Vec<ToolCallRecord>,
    #[serde(default)]
    citations: Vec<Citation>,
}

/// `POST /api/sessions/{id}/messages` - append, applying eviction
pub async fn append(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<String>,
    Json(body): Json<AppendBody>,
) -> std::result::Result<Response, ApiError> {
    let mut message = ChatMessage::new(body.role, body.content);
    message.attachments = body.attachments;
    message.tool_calls = body.tool_calls;
    message.citations = body.citations;

    let receipt = state.sessions.append(&user.id, &id, message)?;
    Ok(Json(receipt).into_response())
}
