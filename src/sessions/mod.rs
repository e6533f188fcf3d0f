//! Chat session models and repository
//!
//! Sessions are ordered message lists with derived titles, owned by one
//! user and persisted behind the `SessionRepository` trait. The
//! `SessionManager` layers the explicit eviction policy on top.

pub mod manager;
pub mod store;

pub use manager::{AppendReceipt, EvictionPolicy, SessionManager, StorageUsage};
pub use store::{MemorySessionStore, SessionRepository, SledSessionStore};

use crate::providers::Citation;
use crate::tools::ToolCallRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title given to sessions before the first user message arrives
pub const DEFAULT_TITLE: &str = "New Chat";

/// Characters of the first user message used for the derived title
const TITLE_MAX_CHARS: usize = 30;

/// Message sender role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// An attachment as persisted with a message
///
/// Images keep a base64 data URL for preview rendering; other files keep
/// only their descriptive fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAttachment {
    /// Client-assigned attachment id
    pub id: String,
    /// Original filename
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    #[serde(rename = "type")]
    pub mime_type: String,
    /// base64 data URL (images only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// One message in a chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message id
    pub id: String,
    /// Sender role
    pub role: Role,
    /// Text content
    pub content: String,
    /// Creation timestamp (RFC 3339 on the wire)
    pub timestamp: DateTime<Utc>,
    /// Attachments carried by the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<StoredAttachment>,
    /// Tool invocations recorded for this message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Citations attached to this message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

impl ChatMessage {
    /// Create a message with a fresh id and the current timestamp
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            tool_calls: Vec::new(),
            citations: Vec::new(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A chat session: ordered messages with a derived title
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Session id (ULID, sortable by creation time)
    pub id: String,
    /// Owning user id
    pub user_id: String,
    /// Display title
    pub title: String,
    /// Ordered messages
    pub messages: Vec<ChatMessage>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Derive a session title from its messages
///
/// The first user message, truncated to 30 characters with an ellipsis.
fn derive_title(messages: &[ChatMessage]) -> String {
    let Some(first_user) = messages.iter().find(|m| m.role == Role::User) else {
        return DEFAULT_TITLE.to_string();
    };

    let title: String = first_user.content.chars().take(TITLE_MAX_CHARS).collect();
    if title.chars().count() < first_user.content.chars().count() {
        format!("{}...", title)
    } else {
        title
    }
}

impl ChatSession {
    /// Create an empty session for a user
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::sessions::ChatSession;
    ///
    /// let session = ChatSession::new("u1", None);
    /// assert_eq!(session.title, "New Chat");
    /// assert_eq!(session.id.len(), 26); // ULID
    /// ```
    pub fn new(user_id: impl Into<String>, title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ulid::Ulid::new().to_string(),
            user_id: user_id.into(),
            title: title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message, deriving the title from the first user message
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.title == DEFAULT_TITLE {
            self.title = derive_title(&self.messages);
        }
        self.updated_at = Utc::now();
    }

    /// Replace the content of a message in place
    ///
    /// Returns false if no message has the given id.
    pub fn edit_message(&mut self, message_id: &str, content: &str) -> bool {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.content = content.to_string();
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Truncate history for a retry of the given user message
    ///
    /// Removes the message and everything after it, returning its content
    /// so the caller can resend it. Only user messages are retryable.
    pub fn truncate_for_retry(&mut self, message_id: &str) -> Option<String> {
        let index = self
            .messages
            .iter()
            .position(|m| m.id == message_id && m.role == Role::User)?;
        let content = self.messages[index].content.clone();
        self.messages.truncate(index);
        self.updated_at = Utc::now();
        Some(content)
    }

    /// Serialized size in bytes, as counted by the eviction policy
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }

    /// Summary row for listings
    pub fn summary(&self) -> ChatSessionSummary {
        ChatSessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            last_message: self
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Summary of a session, as shown in history listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSessionSummary {
    pub id: String,
    pub title: String,
    pub last_message: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
