//! HTTP server
//!
//! The axum router exposing the chat, file-manager, and session
//! endpoints, the shared application state, and the error-to-status
//! mapping for the API's failure taxonomy.

pub mod auth;
pub mod chat;
pub mod files;
pub mod sessions;

pub use auth::Authenticated;

use crate::auth::{AuthVerifier, HttpAuthVerifier};
use crate::chat::Orchestrator;
use crate::config::Config;
use crate::error::{Result, WorkdeskError};
use crate::files::{FileManager, HttpObjectStore, ObjectStore};
use crate::providers::{create_provider, ChatProvider, ProviderKind};
use crate::sessions::SessionManager;
use crate::tools::ToolRegistry;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Session-token verifier
    pub auth: Arc<dyn AuthVerifier>,
    /// File manager over the object storage backend
    pub files: Arc<FileManager>,
    /// Chat session repository with eviction
    pub sessions: Arc<SessionManager>,
    orchestrators: Arc<HashMap<ProviderKind, Arc<Orchestrator>>>,
}

impl AppState {
    /// Assemble state from explicit components
    ///
    /// Tests inject in-memory stores and scripted providers here; `serve`
    /// builds the production wiring via [`AppState::from_config`].
    ///
    /// # Errors
    ///
    /// Returns error if orchestrator construction fails
    pub fn new(
        config: Config,
        auth: Arc<dyn AuthVerifier>,
        store: Arc<dyn ObjectStore>,
        sessions: SessionManager,
        providers: HashMap<ProviderKind, Arc<dyn ChatProvider>>,
    ) -> Result<Self> {
        let tools = Arc::new(ToolRegistry::with_builtins());
        let mut orchestrators = HashMap::new();
        for (kind, provider) in providers {
            orchestrators.insert(
                kind,
                Arc::new(Orchestrator::new(provider, Arc::clone(&tools), &config.chat)?),
            );
        }

        let files = Arc::new(FileManager::new(store, &config.storage));

        Ok(Self {
            config: Arc::new(config),
            auth,
            files,
            sessions: Arc::new(sessions),
            orchestrators: Arc::new(orchestrators),
        })
    }

    /// Build production state from the configuration
    ///
    /// # Errors
    ///
    /// Returns error when the storage service key is missing, the session
    /// backend cannot be opened, or a provider fails to initialize
    pub fn from_config(config: Config) -> Result<Self> {
        let auth: Arc<dyn AuthVerifier> = Arc::new(HttpAuthVerifier::new(
            &config.storage.endpoint,
            config.storage.anon_key.clone(),
        )?);

        let store: Arc<dyn ObjectStore> = Arc::new(HttpObjectStore::new(
            &config.storage.endpoint,
            &config.storage.bucket,
            config.storage.service_key.as_deref(),
        )?);

        let sessions = SessionManager::from_config(&config.sessions)?;

        let mut providers: HashMap<ProviderKind, Arc<dyn ChatProvider>> = HashMap::new();
        for kind in ProviderKind::ALL {
            providers.insert(kind, create_provider(kind, &config.providers)?);
        }

        Self::new(config, auth, store, sessions, providers)
    }

    /// The orchestrator for a provider endpoint
    ///
    /// # Errors
    ///
    /// Returns a configuration error for providers missing from the state
    /// (only possible in tests that wire a subset)
    pub fn orchestrator(&self, kind: ProviderKind) -> Result<Arc<Orchestrator>> {
        self.orchestrators
            .get(&kind)
            .cloned()
            .ok_or_else(|| {
                WorkdeskError::Config(format!("provider {} is not configured", kind)).into()
            })
    }
}

/// API error with its HTTP status
///
/// Non-2xx responses carry `{ "message": ... }` describing the failure
/// category; file endpoints wrap errors in their own envelope instead.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status to respond with
    pub status: StatusCode,
    /// Human-readable failure description
    pub message: String,
}

impl ApiError {
    /// Classify an error into the API failure taxonomy
    pub fn from_error(err: anyhow::Error) -> Self {
        let (status, message) = match err.downcast_ref::<WorkdeskError>() {
            Some(WorkdeskError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg.clone()),
            Some(WorkdeskError::Authentication(_)) => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            Some(WorkdeskError::Forbidden(msg)) => (StatusCode::FORBIDDEN, msg.clone()),
            Some(WorkdeskError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, format!("Not found: {}", msg))
            }
            Some(WorkdeskError::MissingApiKey(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AI service is not configured. Please check the API key.".to_string(),
            ),
            Some(WorkdeskError::StreamingNotSupported) => (
                StatusCode::BAD_REQUEST,
                WorkdeskError::StreamingNotSupported.to_string(),
            ),
            Some(WorkdeskError::RoundLimitExceeded { limit }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Tool-calling round limit reached: limit={}", limit),
            ),
            Some(WorkdeskError::Config(msg)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error: {}", err),
            ),
        };
        Self { status, message }
    }

    /// 400 with the given message
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// 401 Unauthorized
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "Unauthorized".to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_error(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::debug!("Request failed ({}): {}", self.status, self.message);
        (self.status, Json(json!({ "message": self.message }))).into_response()
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat::anthropic))
        .route("/api/chat/openai", post(chat::openai))
        .route("/api/chat/cerebras", post(chat::cerebras))
        .route("/api/chat/local", post(chat::local))
        .route(
            "/api/files",
            post(files::upload).get(files::list).delete(files::remove),
        )
        .route("/api/files/rename", post(files::rename))
        .route("/api/files/download", get(files::download))
        .route("/api/files/thumbnail", get(files::thumbnail))
        .route("/api/files/preview", get(files::preview))
        .route(
            "/api/sessions",
            get(sessions::list).post(sessions::create),
        )
        .route(
            "/api/sessions/:id",
            get(sessions::get_one).delete(sessions::remove),
        )
        .route("/api/sessions/:id/messages", post(sessions::append))
        .with_state(state)
}

/// Bind and run the server
///
/// # Errors
///
/// Returns error if state construction or binding fails
pub async fn serve(config: Config) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config)?;
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WorkdeskError::Config(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .await
        .map_err(|e| WorkdeskError::Config(format!("Server error: {}", e)).into())
}
