//! Authentication
//!
//! Session tokens are verified against the managed auth backend. The
//! `AuthVerifier` trait keeps the HTTP surface testable; `StaticAuthVerifier`
//! backs tests with a fixed token table.

use crate::error::{Result, WorkdeskError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// The authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthUser {
    /// Stable user id; every storage path and session record is scoped by it
    pub id: String,
    /// Email, when the backend reports one
    #[serde(default)]
    pub email: Option<String>,
}

/// Verifies bearer tokens into authenticated users
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Verify a session token
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::Authentication` for missing, expired, or
    /// unknown tokens
    async fn verify(&self, token: &str) -> Result<AuthUser>;
}

/// Verifier backed by the auth backend's `/auth/v1/user` endpoint
pub struct HttpAuthVerifier {
    client: Client,
    endpoint: String,
    anon_key: Option<String>,
}

impl HttpAuthVerifier {
    /// Create a verifier against the given backend endpoint
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(endpoint: &str, anon_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent("workdesk/0.1.0")
            .build()
            .map_err(|e| {
                WorkdeskError::Authentication(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            anon_key,
        })
    }
}

#[async_trait]
impl AuthVerifier for HttpAuthVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser> {
        if token.is_empty() {
            return Err(WorkdeskError::Authentication("Unauthorized".to_string()).into());
        }

        let url = format!("{}/auth/v1/user", self.endpoint);
        let mut request = self.client.get(&url).bearer_auth(token);
        if let Some(anon_key) = &self.anon_key {
            request = request.header("apikey", anon_key);
        }

        let response = request.send().await.map_err(|e| {
            WorkdeskError::Authentication(format!("auth backend unreachable: {}", e))
        })?;

        match response.status() {
            StatusCode::OK => {
                let user: AuthUser = response.json().await.map_err(|e| {
                    WorkdeskError::Authentication(format!("malformed auth response: {}", e))
                })?;
                Ok(user)
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(WorkdeskError::Authentication("Unauthorized".to_string()).into())
            }
            status => Err(WorkdeskError::Authentication(format!(
                "auth backend returned {}",
                status
            ))
            .into()),
        }
    }
}

/// Verifier with a fixed token table, for tests
#[derive(Default)]
pub struct StaticAuthVerifier {
    users: HashMap<String, AuthUser>,
}

impl StaticAuthVerifier {
    /// Create an empty verifier (every token is rejected)
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `token` as `user_id`
    pub fn with_user(mut self, token: &str, user_id: &str) -> Self {
        self.users.insert(
            token.to_string(),
            AuthUser {
                id: user_id.to_string(),
                email: None,
            },
        );
        self
    }
}

#[async_trait]
impl AuthVerifier for StaticAuthVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser> {
        self.users
            .get(token)
            .cloned()
            .ok_or_else(|| WorkdeskError::Authentication("Unauthorized".to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_verifier_accepts_known_token() {
        let verifier = StaticAuthVerifier::new().with_user("token-1", "u1");
        let user = verifier.verify("token-1").await.unwrap();
        assert_eq!(user.id, "u1");
    }

    #[tokio::test]
    async fn test_static_verifier_rejects_unknown_token() {
        let verifier = StaticAuthVerifier::new().with_user("token-1", "u1");
        let err = verifier.verify("other").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkdeskError>(),
            Some(WorkdeskError::Authentication(_))
        ));
    }

    #[tokio::test]
    async fn test_http_verifier_rejects_empty_token_without_network() {
        let verifier = HttpAuthVerifier::new("http://localhost:54321", None).unwrap();
        let err = verifier.verify("").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkdeskError>(),
            Some(WorkdeskError::Authentication(_))
        ));
    }

    #[test]
    fn test_auth_user_deserializes_backend_shape() {
        let json = r#"{"id": "u1", "email": "a@b.c", "role": "authenticated"}"#;
        let user: AuthUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.email.as_deref(), Some("a@b.c"));
    }
}
