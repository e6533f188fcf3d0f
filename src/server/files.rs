//! File-manager endpoints
//!
//! All file routes require an authenticated caller and answer with the
//! `{ success, data }` / `{ success: false, error }` envelope. Errors are
//! backend messages passed through largely verbatim.

use crate::error::WorkdeskError;
use crate::files::UserFile;
use crate::server::{ApiError, AppState, Authenticated};
use axum::extract::{Multipart, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

/// Map an operation error onto the file envelope with its status
fn envelope_error(err: anyhow::Error) -> Response {
    let api_err = ApiError::from_error(err);
    (
        api_err.status,
        Json(json!({ "success": false, "error": api_err.message })),
    )
        .into_response()
}

fn envelope_ok(data: impl serde::Serialize) -> Response {
    Json(json!({ "success": true, "data": data })).into_response()
}

/// Query parameter carrying a storage path
#[derive(Debug, Deserialize)]
pub struct PathQuery {
    path: String,
}

/// `POST /api/files` - multipart upload of a single `file` field
pub async fn upload(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = field.file_name().unwrap_or("file").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                match field.bytes().await {
                    Ok(bytes) => upload = Some((filename, mime_type, bytes.to_vec())),
                    Err(e) => {
                        return envelope_error(
                            WorkdeskError::Validation(format!("Malformed upload: {}", e)).into(),
                        )
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return envelope_error(
                    WorkdeskError::Validation(format!("Malformed upload: {}", e)).into(),
                )
            }
        }
    }

    let Some((filename, mime_type, bytes)) = upload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "No file provided" })),
        )
            .into_response();
    };

    match state.files.upload(&user, &filename, &mime_type, bytes).await {
        Ok(file) => envelope_ok(file),
        Err(e) => envelope_error(e),
    }
}

/// `GET /api/files` - list the caller's files
pub async fn list(State(state): State<AppState>, Authenticated(user): Authenticated) -> Response {
    let files: Result<Vec<UserFile>, _> = state.files.list(&user).await;
    match files {
        Ok(files) => envelope_ok(files),
        Err(e) => envelope_error(e),
    }
}

/// Rename request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameBody {
    old_path: String,
    new_name: String,
}

/// `POST /api/files/rename`
pub async fn rename(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(body): Json<RenameBody>,
) -> Response {
    match state
        .files
        .rename(&user, &body.old_path, &body.new_name)
        .await
    {
        Ok(file) => envelope_ok(file),
        Err(e) => envelope_error(e),
    }
}

/// `DELETE /api/files?path=`
pub async fn remove(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PathQuery>,
) -> Response {
    match state.files.delete(&user, &query.path).await {
        Ok(()) => Json(json!({ "success": true })).into_response(),
        Err(e) => envelope_error(e),
    }
}

/// `GET /api/files/download?path=` - raw bytes with their content type
pub async fn download(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PathQuery>,
) -> Response {
    match state.files.download(&user, &query.path).await {
        Ok((bytes, mime_type)) => {
            let content_type = axum::http::HeaderValue::from_str(&mime_type)
                .unwrap_or_else(|_| axum::http::HeaderValue::from_static("application/octet-stream"));
            Response::builder()
                .header(CONTENT_TYPE, content_type)
                .body(axum::body::Body::from(bytes))
                .expect("static response parts")
        }
        Err(e) => envelope_error(e),
    }
}

/// `GET /api/files/thumbnail?path=` - signed URL with the thumbnail transform
pub async fn thumbnail(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PathQuery>,
) -> Response {
    match state.files.thumbnail_url(&user, &query.path).await {
        Ok(url) => envelope_ok(json!({ "url": url })),
        Err(e) => envelope_error(e),
    }
}

/// `GET /api/files/preview?path=` - signed URL without a transform
pub async fn preview(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Query(query): Query<PathQuery>,
) -> Response {
    match state.files.preview_url(&user, &query.path).await {
        Ok(url) => envelope_ok(json!({ "url": url })),
        Err(e) => envelope_error(e),
    }
}
