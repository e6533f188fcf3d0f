//! Chat request and outcome types
//!
//! A `ChatRequest` carries everything a single chat turn needs: the new
//! user message, trailing history, attachments, the page context for the
//! system prompt, and generation parameters. A `ChatOutcome` is what the
//! loop hands back to the HTTP surface.

use crate::providers::{Attachment, Citation, Message};
use crate::tools::ToolCallRecord;
use serde::{Deserialize, Serialize};

pub use crate::providers::{GenerationParams, ReasoningEffort};

/// Summary of the page the user is looking at, injected into the system
/// prompt so the assistant can reason about visible data
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    /// Active filters
    #[serde(default)]
    pub current_filters: serde_json::Value,
    /// Active sorting
    #[serde(default)]
    pub current_sort: serde_json::Value,
    /// Sample of the rows currently visible
    #[serde(default)]
    pub visible_data: Vec<serde_json::Value>,
    /// Total number of items in the view
    #[serde(default)]
    pub total_count: u64,
}

/// Everything one chat turn needs
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The new user message
    pub message: String,
    /// Trailing history (client caps this at its last 10 messages; the
    /// server truncates again to the configured limit)
    pub history: Vec<Message>,
    /// Page context for the system prompt
    pub context: Option<PageContext>,
    /// Attachments on the new user turn
    pub attachments: Vec<Attachment>,
    /// Generation parameters
    pub params: GenerationParams,
}

/// The result of a completed (non-streaming) chat turn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutcome {
    /// Final assistant text
    pub message: String,
    /// All tool invocations across every round, with their results
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Citations extracted from the response
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
    /// Raw provider response for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_context_deserializes_camel_case() {
        let json = r#"{
            "currentFilters": {"status": "active"},
            "currentSort": {"column": "name"},
            "visibleData": [{"id": 1}],
            "totalCount": 42
        }"#;
        let context: PageContext = serde_json::from_str(json).unwrap();
        assert_eq!(context.total_count, 42);
        assert_eq!(context.visible_data.len(), 1);
        assert_eq!(context.current_filters["status"], "active");
    }

    #[test]
    fn test_page_context_tolerates_missing_fields() {
        let context: PageContext = serde_json::from_str("{}").unwrap();
        assert_eq!(context.total_count, 0);
        assert!(context.visible_data.is_empty());
    }

    #[test]
    fn test_chat_outcome_serializes_camel_case() {
        let outcome = ChatOutcome {
            message: "hi".to_string(),
            tool_calls: vec![ToolCallRecord {
                id: "call_1".to_string(),
                name: "get_current_time".to_string(),
                arguments: serde_json::json!({}),
                result: None,
            }],
            citations: vec![],
            raw_response: None,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"toolCalls\""));
        assert!(!json.contains("citations"));
        assert!(!json.contains("rawResponse"));
    }
}
