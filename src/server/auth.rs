//! Request authentication
//!
//! The `Authenticated` extractor turns a bearer token into an `AuthUser`
//! via the configured verifier, short-circuiting unauthenticated calls
//! with a 401 before any handler logic runs.

use crate::auth::AuthUser;
use crate::server::{ApiError, AppState};
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

/// The authenticated caller, extracted from the Authorization header
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthUser);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(ApiError::unauthorized)?;

        let user = state
            .auth
            .verify(token)
            .await
            .map_err(|_| ApiError::unauthorized())?;

        Ok(Authenticated(user))
    }
}
