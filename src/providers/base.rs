//! Base provider trait and common types
//!
//! This module defines the ChatProvider trait that all chat providers must
//! implement, along with the provider-neutral transcript message types that
//! the orchestration loop operates on. Each adapter translates the neutral
//! transcript into its own wire format per completion round.

use crate::error::Result;
use crate::tools::{Tool, ToolCallRecord};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::str::FromStr;

/// Reasoning effort hint for providers that support it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    /// Wire representation expected by OpenAI-compatible APIs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("Invalid reasoning effort: {}", other)),
        }
    }
}

/// Per-request generation parameters
///
/// Every field is optional; providers fall back to their configured
/// defaults. Parameters a provider does not support are ignored.
#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    /// Model override; the provider default applies when absent
    pub model: Option<String>,
    /// Sampling temperature (local provider)
    pub temperature: Option<f32>,
    /// Nucleus sampling cutoff (local provider)
    pub top_p: Option<f32>,
    /// Maximum completion tokens
    pub max_tokens: Option<u32>,
    /// Reasoning effort (OpenAI, Cerebras)
    pub reasoning_effort: Option<ReasoningEffort>,
    /// Stream the response instead of running the tool loop
    pub stream: bool,
}

/// A file attached to a user turn
///
/// Image attachments carry their raw bytes so adapters can base64-inline
/// them into the provider's multimodal format. Non-image attachments are
/// described as text and their bytes are never sent upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Original filename
    pub name: String,
    /// MIME type, e.g. `image/png`
    pub mime_type: String,
    /// Size in bytes as reported by the client
    pub size: u64,
    /// Raw content bytes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<u8>,
}

impl Attachment {
    /// Whether this attachment is an image of any subtype
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    /// Text note appended to the user turn for non-image attachments
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::providers::Attachment;
    ///
    /// let att = Attachment {
    ///     name: "report.pdf".to_string(),
    ///     mime_type: "application/pdf".to_string(),
    ///     size: 2048,
    ///     data: vec![],
    /// };
    /// assert_eq!(att.describe(), "File attachment: report.pdf (application/pdf, 2 KB)");
    /// ```
    pub fn describe(&self) -> String {
        format!(
            "File attachment: {} ({}, {})",
            self.name,
            self.mime_type,
            format_file_size(self.size)
        )
    }
}

/// Format a byte count the way the chat UI displays attachment sizes
///
/// # Examples
///
/// ```
/// use workdesk::providers::format_file_size;
///
/// assert_eq!(format_file_size(0), "0 Bytes");
/// assert_eq!(format_file_size(1024), "1 KB");
/// assert_eq!(format_file_size(1536), "1.5 KB");
/// ```
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let i = ((bytes as f64).ln() / 1024_f64.ln()).floor() as usize;
    let i = i.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024_f64.powi(i as i32);
    // Two decimals with trailing zeros trimmed ("1.50" -> "1.5", "1.00" -> "1")
    let formatted = format!("{:.2}", value);
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[i])
}

/// A tool invocation requested by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call identifier
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments as a JSON object
    pub arguments: serde_json::Value,
}

/// A single turn in the provider-neutral transcript
///
/// The orchestration loop builds and extends a transcript of these turns;
/// every adapter translates the full transcript into its wire format on
/// each round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Role of the sender (user, assistant, system, tool)
    pub role: String,
    /// Text content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Attachments (user turns only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Tool calls requested by the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// Originating call id (tool-result turns only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Creates a new user message
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::providers::Message;
    ///
    /// let msg = Message::user("What time is it?");
    /// assert_eq!(msg.role, "user");
    /// ```
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            attachments: Vec::new(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a user message carrying attachments
    pub fn user_with_attachments(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.into()),
            attachments,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new assistant message
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::providers::Message;
    ///
    /// let msg = Message::assistant("It is noon.");
    /// assert_eq!(msg.role, "assistant");
    /// ```
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.into()),
            attachments: Vec::new(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.into()),
            attachments: Vec::new(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Creates an assistant turn that requests tool invocations
    ///
    /// The optional text preserves any content the provider emitted
    /// alongside its tool requests.
    pub fn assistant_with_tools(content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
            attachments: Vec::new(),
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    /// Creates a tool-result turn tagged with the originating call id
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::providers::Message;
    ///
    /// let msg = Message::tool_result("call_123", "{\"iso\":\"2026-01-01T00:00:00Z\"}");
    /// assert_eq!(msg.role, "tool");
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
    /// ```
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.into()),
            attachments: Vec::new(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

/// A source citation attached to the final answer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Citation {
    /// Source URL
    pub url: String,
    /// Source title
    pub title: String,
    /// The excerpt the answer cites
    pub cited_text: String,
}

/// Token usage reported by a provider for one completion round
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of tokens in the prompt
    pub prompt_tokens: usize,
    /// Number of tokens in the completion
    pub completion_tokens: usize,
    /// Total tokens used (prompt + completion)
    pub total_tokens: usize,
}

impl TokenUsage {
    /// Create a new TokenUsage instance
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::providers::TokenUsage;
    ///
    /// let usage = TokenUsage::new(100, 50);
    /// assert_eq!(usage.total_tokens, 150);
    /// ```
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// The parsed outcome of one completion round
#[derive(Debug, Clone, Default)]
pub struct ProviderTurn {
    /// Assistant text (may be empty on pure tool-call turns)
    pub text: String,
    /// Tool invocations the loop must execute before the next round
    pub tool_calls: Vec<ToolCall>,
    /// Tool calls the provider executed on its own side (e.g. web search),
    /// already complete and reported for the trace only
    pub server_tool_records: Vec<ToolCallRecord>,
    /// Citations extracted from the response text
    pub citations: Vec<Citation>,
    /// Token usage for this round
    pub usage: Option<TokenUsage>,
    /// Raw provider response for debugging
    pub raw: Option<serde_json::Value>,
}

impl ProviderTurn {
    /// Whether the loop must run tools before asking for another round
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A stream of raw text chunks from a streaming completion
pub type TextStream = Pin<Box<dyn futures::Stream<Item = Result<String>> + Send>>;

/// Chat provider trait
///
/// All chat providers (Anthropic, OpenAI, Cerebras, the local endpoint)
/// implement this trait. The orchestration loop is provider-agnostic;
/// adapters only translate transcripts and tool schemas.
///
/// # Examples
///
/// ```no_run
/// use workdesk::providers::{ChatProvider, GenerationParams, Message, ProviderTurn};
/// use workdesk::tools::Tool;
/// use workdesk::error::Result;
/// use async_trait::async_trait;
///
/// struct MyProvider;
///
/// #[async_trait]
/// impl ChatProvider for MyProvider {
///     fn name(&self) -> &str {
///         "my-provider"
///     }
///
///     async fn complete(
///         &self,
///         _transcript: &[Message],
///         _tools: &[Tool],
///         _params: &GenerationParams,
///     ) -> Result<ProviderTurn> {
///         Ok(ProviderTurn {
///             text: "Response".to_string(),
///             ..ProviderTurn::default()
///         })
///     }
/// }
/// ```
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider name used in logs and error messages
    fn name(&self) -> &str;

    /// Run one completion round over the accumulated transcript
    ///
    /// # Arguments
    ///
    /// * `transcript` - Full conversation so far (system prompt first)
    /// * `tools` - Tool schemas the provider may invoke
    /// * `params` - Per-request generation parameters
    ///
    /// # Errors
    ///
    /// Returns error if the API call fails, the API key is missing, or the
    /// response cannot be parsed
    async fn complete(
        &self,
        transcript: &[Message],
        tools: &[Tool],
        params: &GenerationParams,
    ) -> Result<ProviderTurn>;

    /// Stream a completion as raw text chunks
    ///
    /// Streaming bypasses the tool-calling loop entirely; no tools are
    /// offered to the provider.
    ///
    /// # Errors
    ///
    /// The default implementation reports that streaming is unsupported.
    async fn stream(
        &self,
        _transcript: &[Message],
        _params: &GenerationParams,
    ) -> Result<TextStream> {
        Err(crate::error::WorkdeskError::StreamingNotSupported.into())
    }
}

/// Validates a transcript and removes orphan tool-result turns
///
/// An orphan tool result has no preceding assistant turn whose tool_calls
/// contain its call id (or no call id at all). Providers reject such
/// sequences with 400 errors, so they are dropped with a warning before
/// translation.
///
/// # Examples
///
/// ```
/// use workdesk::providers::{Message, validate_transcript};
///
/// let transcript = vec![
///     Message::user("Do something"),
///     Message::tool_result("call_123", "Result"),
/// ];
/// let validated = validate_transcript(&transcript);
/// assert_eq!(validated.len(), 1); // orphan dropped, user turn remains
/// ```
pub fn validate_transcript(transcript: &[Message]) -> Vec<Message> {
    use std::collections::HashSet;

    let mut valid_call_ids: HashSet<&str> = HashSet::new();
    for message in transcript {
        if message.role == "assistant" {
            if let Some(tool_calls) = &message.tool_calls {
                for call in tool_calls {
                    valid_call_ids.insert(call.id.as_str());
                }
            }
        }
    }

    transcript
        .iter()
        .filter(|message| {
            if message.role != "tool" {
                return true;
            }
            match &message.tool_call_id {
                Some(id) if valid_call_ids.contains(id.as_str()) => true,
                Some(id) => {
                    tracing::warn!("Dropping orphan tool result with call id: {}", id);
                    false
                }
                None => {
                    tracing::warn!("Dropping tool result without call id");
                    false
                }
            }
        })
        .cloned()
        .collect()
}
