//! Chat endpoints
//!
//! One handler per provider, all funneling into the shared orchestration
//! loop. Requests arrive as JSON or as multipart form data (the latter
//! whenever attachments are present), mirroring the UI's submission
//! formats.

use crate::chat::ChatRequest;
use crate::providers::{Attachment, GenerationParams, Message, ProviderKind};
use crate::server::{ApiError, AppState, Authenticated};
use axum::body::{Body, Bytes};
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use std::collections::HashMap;

/// One trailing-history entry as the client sends it
#[derive(Debug, Deserialize)]
struct HistoryEntry {
    role: String,
    #[serde(default)]
    content: String,
}

impl HistoryEntry {
    fn into_message(self) -> Message {
        Message {
            role: self.role,
            content: Some(self.content),
            attachments: Vec::new(),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// JSON request body
#[derive(Debug, Default, Deserialize)]
struct ChatJsonBody {
    message: Option<String>,
    context: Option<crate::chat::PageContext>,
    #[serde(default)]
    messages: Vec<HistoryEntry>,
    model: Option<String>,
    reasoning_effort: Option<String>,
    #[serde(default)]
    stream: bool,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
}

fn build_chat_request(
    body: ChatJsonBody,
    attachments: Vec<Attachment>,
) -> std::result::Result<ChatRequest, ApiError> {
    let message = body
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Invalid message content"))?;

    let reasoning_effort = body
        .reasoning_effort
        .as_deref()
        .map(str::parse)
        .transpose()
        .map_err(ApiError::bad_request)?;

    Ok(ChatRequest {
        message,
        history: body
            .messages
            .into_iter()
            .map(HistoryEntry::into_message)
            .collect(),
        context: body.context,
        attachments,
        params: GenerationParams {
            model: body.model.filter(|m| !m.is_empty()),
            temperature: body.temperature,
            top_p: body.top_p,
            max_tokens: body.max_tokens,
            reasoning_effort,
            stream: body.stream,
        },
    })
}

/// Parse a multipart submission into the common body + attachments
///
/// Attachment `i` arrives as the binary field `attachment-{i}` plus the
/// descriptive fields `attachment-{i}-name`, `-type`, and `-size`;
/// `attachmentCount` closes the set.
async fn parse_multipart(
    mut multipart: Multipart,
) -> std::result::Result<(ChatJsonBody, Vec<Attachment>), ApiError> {
    let mut texts: HashMap<String, String> = HashMap::new();
    let mut blobs: HashMap<String, Vec<u8>> = HashMap::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed form data: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed form data: {}", e)))?;

        let is_blob = name.starts_with("attachment-")
            && name
                .strip_prefix("attachment-")
                .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()));
        if is_blob {
            blobs.insert(name, data.to_vec());
        } else {
            texts.insert(name, String::from_utf8_lossy(&data).into_owned());
        }
    }

    let parse_json = |key: &str| -> Option<serde_json::Value> {
        texts
            .get(key)
            .filter(|raw| !raw.is_empty() && raw.as_str() != "null")
            .and_then(|raw| serde_json::from_str(raw).ok())
    };

    let body = ChatJsonBody {
        message: texts.get("message").cloned(),
        context: parse_json("context").and_then(|v| serde_json::from_value(v).ok()),
        messages: parse_json("messages")
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default(),
        model: texts.get("model").cloned(),
        reasoning_effort: texts.get("reasoning_effort").cloned(),
        stream: texts.get("stream").map(|v| v == "true").unwrap_or(false),
        temperature: texts.get("temperature").and_then(|v| v.parse().ok()),
        top_p: texts.get("top_p").and_then(|v| v.parse().ok()),
        max_tokens: texts.get("max_tokens").and_then(|v| v.parse().ok()),
    };

    let count: usize = texts
        .get("attachmentCount")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let mut attachments = Vec::new();
    for i in 0..count {
        let Some(data) = blobs.remove(&format!("attachment-{}", i)) else {
            continue;
        };
        let name = texts
            .get(&format!("attachment-{}-name", i))
            .cloned()
            .unwrap_or_else(|| format!("attachment-{}", i));
        let mime_type = texts
            .get(&format!("attachment-{}-type", i))
            .cloned()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let size = texts
            .get(&format!("attachment-{}-size", i))
            .and_then(|v| v.parse().ok())
            .unwrap_or(data.len() as u64);
        attachments.push(Attachment {
            name,
            mime_type,
            size,
            data,
        });
    }

    Ok((body, attachments))
}

/// Extract a chat request from either submission format
async fn parse_chat_request(
    state: &AppState,
    request: Request,
) -> std::result::Result<ChatRequest, ApiError> {
    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if content_type.starts_with("multipart/form-data") {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Malformed form data: {}", e)))?;
        let (body, attachments) = parse_multipart(multipart).await?;
        build_chat_request(body, attachments)
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), 32 * 1024 * 1024)
            .await
            .map_err(|e| ApiError::bad_request(format!("Unreadable body: {}", e)))?;
        let body: ChatJsonBody = serde_json::from_slice(&bytes)
            .map_err(|_| ApiError::bad_request("Invalid message content"))?;
        build_chat_request(body, Vec::new())
    }
}

async fn handle(
    state: AppState,
    kind: ProviderKind,
    request: Request,
) -> std::result::Result<Response, ApiError> {
    let chat_request = parse_chat_request(&state, request).await?;
    let orchestrator = state.orchestrator(kind)?;

    if chat_request.params.stream {
        let stream = orchestrator.run_streaming(&chat_request).await?;
        let body = Body::from_stream(stream.map(|chunk| chunk.map(Bytes::from)));
        return Ok(Response::builder()
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .expect("static response parts"));
    }

    let outcome = orchestrator.run(&chat_request).await?;
    Ok(Json(outcome).into_response())
}

/// `POST /api/chat` - Anthropic
pub async fn anthropic(
    State(state): State<AppState>,
    _auth: Authenticated,
    request: Request,
) -> std::result::Result<Response, ApiError> {
    handle(state, ProviderKind::Anthropic, request).await
}

/// `POST /api/chat/openai`
pub async fn openai(
    State(state): State<AppState>,
    _auth: Authenticated,
    request: Request,
) -> std::result::Result<Response, ApiError> {
    handle(state, ProviderKind::OpenAi, request).await
}

/// `POST /api/chat/cerebras`
pub async fn cerebras(
    State(state): State<AppState>,
    _auth: Authenticated,
    request: Request,
) -> std::result::Result<Response, ApiError> {
    handle(state, ProviderKind::Cerebras, request).await
}

/// `POST /api/chat/local` - local Ollama-compatible endpoint
pub async fn local(
    State(state): State<AppState>,
    _auth: Authenticated,
    request: Request,
) -> std::result::Result<Response, ApiError> {
    handle(state, ProviderKind::Local, request).await
}
