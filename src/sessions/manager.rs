//! Session manager and eviction policy
//!
//! Wraps a `SessionRepository` with the explicit quota policy: a
//! serialized-size cap per user, a session-count cap, and a per-session
//! message cap. When an append would exceed the size cap, the oldest
//! sessions by `updated_at` are evicted, never the session being appended
//! to, and the append still succeeds.

use crate::config::SessionsConfig;
use crate::error::{Result, WorkdeskError};
use crate::sessions::{
    ChatMessage, ChatSession, ChatSessionSummary, MemorySessionStore, SessionRepository,
    SledSessionStore,
};
use serde::Serialize;
use std::sync::Arc;

/// Size- and count-based retention policy
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    /// Serialized-size cap per user, in bytes
    pub max_bytes: usize,
    /// Maximum sessions retained per user
    pub max_sessions: usize,
    /// Maximum messages retained per session
    pub max_messages: usize,
    /// Sessions spared from size-cap eviction (most recently updated)
    pub keep_recent: usize,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            max_sessions: 10,
            max_messages: 50,
            keep_recent: 2,
        }
    }
}

impl From<&SessionsConfig> for EvictionPolicy {
    fn from(config: &SessionsConfig) -> Self {
        Self {
            max_bytes: config.max_bytes,
            max_sessions: config.max_sessions,
            max_messages: config.max_messages,
            keep_recent: config.keep_recent,
        }
    }
}

/// Result of appending a message
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendReceipt {
    /// Session the message landed in
    pub session_id: String,
    /// Id of the appended message
    pub message_id: String,
    /// Sessions evicted to make room; non-zero means the surface should
    /// tell the user old history was cleared
    pub evicted_sessions: usize,
}

/// Per-user storage accounting
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageUsage {
    /// Serialized bytes across all sessions
    pub total_bytes: usize,
    /// Number of sessions
    pub sessions_count: usize,
    /// Number of messages across all sessions
    pub messages_count: usize,
}

/// Session repository with the eviction policy applied
pub struct SessionManager {
    repo: Arc<dyn SessionRepository>,
    policy: EvictionPolicy,
}

impl SessionManager {
    /// Create a manager over an explicit repository
    pub fn new(repo: Arc<dyn SessionRepository>, policy: EvictionPolicy) -> Self {
        Self { repo, policy }
    }

    /// Build the repository named by the configuration
    ///
    /// # Errors
    ///
    /// Returns error for unknown backends or when the sled store cannot
    /// be opened
    pub fn from_config(config: &SessionsConfig) -> Result<Self> {
        let repo: Arc<dyn SessionRepository> = match config.backend.as_str() {
            "sled" => match &config.path {
                Some(path) => Arc::new(SledSessionStore::new(path)?),
                None => Arc::new(SledSessionStore::open_default()?),
            },
            "memory" => Arc::new(MemorySessionStore::new()),
            other => {
                return Err(WorkdeskError::Config(format!(
                    "Unknown sessions backend: {}",
                    other
                ))
                .into())
            }
        };
        Ok(Self::new(repo, EvictionPolicy::from(config)))
    }

    /// Create a new session for a user
    pub fn create(&self, user_id: &str, title: Option<String>) -> Result<ChatSession> {
        let session = ChatSession::new(user_id, title);
        self.repo.upsert(&session)?;
        Ok(session)
    }

    /// Session summaries, most recently updated first
    pub fn list(&self, user_id: &str) -> Result<Vec<ChatSessionSummary>> {
        Ok(self
            .repo
            .list(user_id)?
            .iter()
            .map(ChatSession::summary)
            .collect())
    }

    /// One full session
    pub fn get(&self, user_id: &str, session_id: &str) -> Result<Option<ChatSession>> {
        self.repo.get(user_id, session_id)
    }

    /// Delete a session
    pub fn delete(&self, user_id: &str, session_id: &str) -> Result<()> {
        self.repo.delete(user_id, session_id)
    }

    /// Current storage accounting for a user
    pub fn storage_usage(&self, user_id: &str) -> Result<StorageUsage> {
        let sessions = self.repo.list(user_id)?;
        Ok(StorageUsage {
            total_bytes: sessions.iter().map(ChatSession::serialized_size).sum(),
            sessions_count: sessions.len(),
            messages_count: sessions.iter().map(|s| s.messages.len()).sum(),
        })
    }

    /// Append a message to a session, applying the retention policy
    ///
    /// The append always succeeds once the target session exists; the
    /// policy only ever removes *other* sessions (oldest `updated_at`
    /// first, sparing the `keep_recent` most recent) and trailing
    /// messages beyond the per-session cap.
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::NotFound` when the session does not exist
    pub fn append(
        &self,
        user_id: &str,
        session_id: &str,
        message: ChatMessage,
    ) -> Result<AppendReceipt> {
        let mut session = self
            .repo
            .get(user_id, session_id)?
            .ok_or_else(|| WorkdeskError::NotFound(format!("session {}", session_id)))?;

        let message_id = message.id.clone();
        session.push_message(message);

        if session.messages.len() > self.policy.max_messages {
            let excess = session.messages.len() - self.policy.max_messages;
            session.messages.drain(..excess);
        }

        let evicted = self.evict_for(user_id, &session)?;
        self.repo.upsert(&session)?;
        crate::metrics::record_session_evictions(evicted);

        Ok(AppendReceipt {
            session_id: session.id,
            message_id,
            evicted_sessions: evicted,
        })
    }

    /// Replace a message's content
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::NotFound` when the session or message does
    /// not exist
    pub fn edit_message(
        &self,
        user_id: &str,
        session_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<()> {
        let mut session = self
            .repo
            .get(user_id, session_id)?
            .ok_or_else(|| WorkdeskError::NotFound(format!("session {}", session_id)))?;
        if !session.edit_message(message_id, content) {
            return Err(WorkdeskError::NotFound(format!("message {}", message_id)).into());
        }
        self.repo.upsert(&session)
    }

    /// Truncate a session for a retry, returning the retried content
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::NotFound` when the session or retryable
    /// user message does not exist
    pub fn truncate_for_retry(
        &self,
        user_id: &str,
        session_id: &str,
        message_id: &str,
    ) -> Result<String> {
        let mut session = self
            .repo
            .get(user_id, session_id)?
            .ok_or_else(|| WorkdeskError::NotFound(format!("session {}", session_id)))?;
        let content = session
            .truncate_for_retry(message_id)
            .ok_or_else(|| WorkdeskError::NotFound(format!("message {}", message_id)))?;
        self.repo.upsert(&session)?;
        Ok(content)
    }

    /// Evict other sessions until `current` fits under the caps
    ///
    /// Returns the number of sessions removed.
    fn evict_for(&self, user_id: &str, current: &ChatSession) -> Result<usize> {
        // Oldest last, so eviction candidates pop off the back.
        let mut others: Vec<ChatSession> = self
            .repo
            .list(user_id)?
            .into_iter()
            .filter(|s| s.id != current.id)
            .collect();

        let mut total: usize =
            others.iter().map(ChatSession::serialized_size).sum::<usize>()
                + current.serialized_size();
        let mut evicted = 0;

        while others.len() + 1 > self.policy.max_sessions
            || (total > self.policy.max_bytes && others.len() + 1 > self.policy.keep_recent)
        {
            let Some(oldest) = others.pop() else {
                break;
            };
            tracing::info!(
                "Evicting session {} ({} bytes) for user {}",
                oldest.id,
                oldest.serialized_size(),
                user_id
            );
            total -= oldest.serialized_size();
            self.repo.delete(user_id, &oldest.id)?;
            evicted += 1;
        }

        if total > self.policy.max_bytes {
            tracing::warn!(
                "User {} still over the session size cap after eviction ({} > {} bytes)",
                user_id,
                total,
                self.policy.max_bytes
            );
        }

        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    fn manager_with_policy(policy: EvictionPolicy) -> SessionManager {
        SessionManager::new(Arc::new(MemorySessionStore::new()), policy)
    }

    fn manager() -> SessionManager {
        manager_with_policy(EvictionPolicy::default())
    }

    #[test]
    fn test_create_and_get() {
        let manager = manager();
        let session = manager.create("u1", None).unwrap();
        let loaded = manager.get("u1", &session.id).unwrap().unwrap();
        assert_eq!(loaded.id, session.id);
    }

    #[test]
    fn test_append_to_missing_session_is_not_found() {
        let manager = manager();
        let err = manager
            .append("u1", "missing", ChatMessage::user("hi"))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<WorkdeskError>(),
            Some(WorkdeskError::NotFound(_))
        ));
    }

    #[test]
    fn test_append_updates_title_and_counts() {
        let manager = manager();
        let session = manager.create("u1", None).unwrap();
        let receipt = manager
            .append("u1", &session.id, ChatMessage::user("hello there"))
            .unwrap();
        assert_eq!(receipt.evicted_sessions, 0);

        let loaded = manager.get("u1", &session.id).unwrap().unwrap();
        assert_eq!(loaded.title, "hello there");
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.messages[0].id, receipt.message_id);
    }

    #[test]
    fn test_messages_truncate_to_cap() {
        let policy = EvictionPolicy {
            max_messages: 3,
            ..EvictionPolicy::default()
        };
        let manager = manager_with_policy(policy);
        let session = manager.create("u1", None).unwrap();

        for i in 0..5 {
            manager
                .append("u1", &session.id, ChatMessage::user(format!("m{}", i)))
                .unwrap();
        }

        let loaded = manager.get("u1", &session.id).unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 3);
        assert_eq!(loaded.messages[0].content, "m2");
        assert_eq!(loaded.messages[2].content, "m4");
    }

    #[test]
    fn test_size_cap_evicts_oldest_non_current_and_append_succeeds() {
        let policy = EvictionPolicy {
            max_bytes: 2600,
            keep_recent: 2,
            ..EvictionPolicy::default()
        };
        let manager = manager_with_policy(policy);

        let old = manager.create("u1", None).unwrap();
        manager
            .append("u1", &old.id, ChatMessage::user("x".repeat(900)))
            .unwrap();
        sleep(Duration::from_millis(5));

        let middle = manager.create("u1", None).unwrap();
        manager
            .append("u1", &middle.id, ChatMessage::user("y".repeat(900)))
            .unwrap();
        sleep(Duration::from_millis(5));

        let current = manager.create("u1", None).unwrap();
        let receipt = manager
            .append("u1", &current.id, ChatMessage::user("z".repeat(900)))
            .unwrap();

        // The oldest session went; the current one and the next most
        // recent stayed; the append landed.
        assert_eq!(receipt.evicted_sessions, 1);
        assert!(manager.get("u1", &old.id).unwrap().is_none());
        assert!(manager.get("u1", &middle.id).unwrap().is_some());
        let loaded = manager.get("u1", &current.id).unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
    }

    #[test]
    fn test_current_session_is_never_evicted() {
        let policy = EvictionPolicy {
            max_bytes: 100, // every session is over the cap by itself
            keep_recent: 1,
            ..EvictionPolicy::default()
        };
        let manager = manager_with_policy(policy);
        let session = manager.create("u1", None).unwrap();

        let receipt = manager
            .append("u1", &session.id, ChatMessage::user("x".repeat(500)))
            .unwrap();
        assert_eq!(receipt.evicted_sessions, 0);
        assert!(manager.get("u1", &session.id).unwrap().is_some());
    }

    #[test]
    fn test_session_count_cap() {
        let policy = EvictionPolicy {
            max_sessions: 3,
            ..EvictionPolicy::default()
        };
        let manager = manager_with_policy(policy);

        let mut ids = Vec::new();
        for i in 0..5 {
            let session = manager.create("u1", None).unwrap();
            manager
                .append("u1", &session.id, ChatMessage::user(format!("s{}", i)))
                .unwrap();
            ids.push(session.id);
            sleep(Duration::from_millis(5));
        }

        let summaries = manager.list("u1").unwrap();
        assert_eq!(summaries.len(), 3);
        // The two oldest are gone.
        assert!(manager.get("u1", &ids[0]).unwrap().is_none());
        assert!(manager.get("u1", &ids[1]).unwrap().is_none());
        assert!(manager.get("u1", &ids[4]).unwrap().is_some());
    }

    #[test]
    fn test_eviction_is_scoped_per_user() {
        let policy = EvictionPolicy {
            max_sessions: 1,
            ..EvictionPolicy::default()
        };
        let manager = manager_with_policy(policy);

        let mine = manager.create("u1", None).unwrap();
        manager
            .append("u1", &mine.id, ChatMessage::user("mine"))
            .unwrap();

        let theirs = manager.create("u2", None).unwrap();
        manager
            .append("u2", &theirs.id, ChatMessage::user("theirs"))
            .unwrap();

        assert!(manager.get("u1", &mine.id).unwrap().is_some());
        assert!(manager.get("u2", &theirs.id).unwrap().is_some());
    }

    #[test]
    fn test_storage_usage() {
        let manager = manager();
        let session = manager.create("u1", None).unwrap();
        manager
            .append("u1", &session.id, ChatMessage::user("hello"))
            .unwrap();
        manager
            .append("u1", &session.id, ChatMessage::assistant("hi"))
            .unwrap();

        let usage = manager.storage_usage("u1").unwrap();
        assert_eq!(usage.sessions_count, 1);
        assert_eq!(usage.messages_count, 2);
        assert!(usage.total_bytes > 0);
    }

    #[test]
    fn test_edit_message_through_manager() {
        let manager = manager();
        let session = manager.create("u1", None).unwrap();
        let receipt = manager
            .append("u1", &session.id, ChatMessage::user("typo"))
            .unwrap();

        manager
            .edit_message("u1", &session.id, &receipt.message_id, "fixed")
            .unwrap();
        let loaded = manager.get("u1", &session.id).unwrap().unwrap();
        assert_eq!(loaded.messages[0].content, "fixed");

        assert!(manager
            .edit_message("u1", &session.id, "missing", "x")
            .is_err());
    }

    #[test]
    fn test_truncate_for_retry_through_manager() {
        let manager = manager();
        let session = manager.create("u1", None).unwrap();
        manager
            .append("u1", &session.id, ChatMessage::user("first"))
            .unwrap();
        let retry = manager
            .append("u1", &session.id, ChatMessage::user("retry me"))
            .unwrap();
        manager
            .append("u1", &session.id, ChatMessage::assistant("stale answer"))
            .unwrap();

        let content = manager
            .truncate_for_retry("u1", &session.id, &retry.message_id)
            .unwrap();
        assert_eq!(content, "retry me");
        let loaded = manager.get("u1", &session.id).unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
    }

    #[test]
    fn test_from_config_memory_backend() {
        let config = SessionsConfig {
            backend: "memory".to_string(),
            ..SessionsConfig::default()
        };
        let manager = SessionManager::from_config(&config).unwrap();
        manager.create("u1", None).unwrap();
        assert_eq!(manager.list("u1").unwrap().len(), 1);
    }

    #[test]
    fn test_from_config_sled_backend_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionsConfig {
            backend: "sled".to_string(),
            path: Some(dir.path().join("sessions.db")),
            ..SessionsConfig::default()
        };
        let manager = SessionManager::from_config(&config).unwrap();
        manager.create("u1", None).unwrap();
        assert_eq!(manager.list("u1").unwrap().len(), 1);
    }
}
