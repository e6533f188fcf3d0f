//! Tool catalog and dispatch
//!
//! This module contains the tool schema type, the execution outcome shape
//! surfaced to the model, the ToolExecutor trait, and the registry the
//! orchestration loop dispatches through.

pub mod current_time;

pub use current_time::CurrentTimeTool;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Tool definition
///
/// Represents a tool that can be called by a chat provider. The parameter
/// spec is a JSON schema; adapters translate it into each provider's
/// expected tool-definition format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    /// Name of the tool
    pub name: String,
    /// Description of what the tool does
    pub description: String,
    /// JSON schema for the tool's parameters
    pub parameters: serde_json::Value,
}

impl Tool {
    /// Create a new tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Outcome of a tool execution
///
/// This is the exact shape surfaced back to the model as a tool result:
/// success with data, or failure with an error string. Executor errors are
/// captured into this shape rather than failing the chat turn, so the
/// model can see the failure and react to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the execution succeeded
    pub success: bool,
    /// Result data on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolOutcome {
    /// Create a successful outcome carrying result data
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::tools::ToolOutcome;
    ///
    /// let outcome = ToolOutcome::success(serde_json::json!({"iso": "2026-01-01T00:00:00Z"}));
    /// assert!(outcome.success);
    /// assert!(outcome.error.is_none());
    /// ```
    pub fn success(data: serde_json::Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create a failed outcome carrying an error message
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::tools::ToolOutcome;
    ///
    /// let outcome = ToolOutcome::failure("Unknown function: frobnicate");
    /// assert!(!outcome.success);
    /// assert_eq!(outcome.error.as_deref(), Some("Unknown function: frobnicate"));
    /// ```
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Render this outcome as the content of a tool-result turn
    ///
    /// Success yields the JSON-encoded data; failure yields the error
    /// string (or "Unknown error" when absent).
    pub fn to_result_content(&self) -> String {
        if self.success {
            self.data
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "null".to_string())
        } else {
            self.error
                .clone()
                .unwrap_or_else(|| "Unknown error".to_string())
        }
    }
}

/// A completed (or pending) tool invocation, kept for the response trace
///
/// Records accumulate across all rounds of a chat turn and are returned to
/// the caller alongside the final message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Call identifier assigned by the provider
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments the provider supplied
    pub arguments: serde_json::Value,
    /// Execution result, if the call has completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolOutcome>,
}

/// Tool executor trait
///
/// Each tool implements this trait to provide its schema and execution
/// logic.
///
/// # Examples
///
/// ```no_run
/// use workdesk::tools::{Tool, ToolExecutor, ToolOutcome};
/// use workdesk::error::Result;
/// use async_trait::async_trait;
/// use serde_json::Value;
///
/// struct EchoTool;
///
/// #[async_trait]
/// impl ToolExecutor for EchoTool {
///     fn definition(&self) -> Tool {
///         Tool::new("echo", "Echoes its arguments", serde_json::json!({
///             "type": "object",
///             "properties": {}
///         }))
///     }
///
///     async fn execute(&self, args: Value) -> Result<ToolOutcome> {
///         Ok(ToolOutcome::success(args))
///     }
/// }
/// ```
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns the tool definition
    fn definition(&self) -> Tool;

    /// Executes the tool with the given arguments
    ///
    /// # Errors
    ///
    /// Returns error on unrecoverable execution failures; the registry
    /// converts such errors into failed outcomes before the model sees
    /// them.
    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome>;
}

/// Registry of available tools
///
/// The registry holds the static tool catalog and dispatches invocations
/// by name. Dispatch never fails the chat turn: unknown names and executor
/// errors both become failed outcomes.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in tool catalog
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::tools::ToolRegistry;
    ///
    /// let registry = ToolRegistry::with_builtins();
    /// assert!(registry.get("get_current_time").is_some());
    /// ```
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CurrentTimeTool));
        registry
    }

    /// Register a tool executor under its declared name
    pub fn register(&mut self, executor: Arc<dyn ToolExecutor>) {
        let name = executor.definition().name;
        self.tools.insert(name, executor);
    }

    /// Get a tool executor by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.get(name).cloned()
    }

    /// Get all tool definitions
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools
            .values()
            .map(|executor| executor.definition())
            .collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool by name, capturing every failure as an outcome
    ///
    /// An unknown tool name yields `Unknown function: <name>`; an error
    /// returned by the executor is converted to a failed outcome with the
    /// error's message. Neither aborts the chat turn.
    ///
    /// # Examples
    ///
    /// ```
    /// use workdesk::tools::ToolRegistry;
    ///
    /// # tokio_test::block_on(async {
    /// let registry = ToolRegistry::with_builtins();
    /// let outcome = registry.dispatch("frobnicate", serde_json::json!({})).await;
    /// assert!(!outcome.success);
    /// assert_eq!(outcome.error.as_deref(), Some("Unknown function: frobnicate"));
    /// # });
    /// ```
    pub async fn dispatch(&self, name: &str, args: serde_json::Value) -> ToolOutcome {
        let Some(executor) = self.get(name) else {
            tracing::warn!("Tool dispatch for unregistered name: {}", name);
            return ToolOutcome::failure(format!("Unknown function: {}", name));
        };

        match executor.execute(args).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Tool '{}' execution failed: {}", name, e);
                ToolOutcome::failure(e.to_string())
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingTool;

    #[async_trait]
    impl ToolExecutor for FailingTool {
        fn definition(&self) -> Tool {
            Tool::new(
                "failing_tool",
                "Always fails",
                serde_json::json!({"type": "object", "properties": {}}),
            )
        }

        async fn execute(&self, _args: serde_json::Value) -> Result<ToolOutcome> {
            Err(crate::error::WorkdeskError::Tool("boom".to_string()).into())
        }
    }

    struct EchoTool;

    #[async_trait]
    impl ToolExecutor for EchoTool {
        fn definition(&self) -> Tool {
            Tool::new(
                "echo",
                "Echoes its arguments",
                serde_json::json!({"type": "object", "properties": {}}),
            )
        }

        async fn execute(&self, args: serde_json::Value) -> Result<ToolOutcome> {
            Ok(ToolOutcome::success(args))
        }
    }

    #[test]
    fn test_tool_creation() {
        let tool = Tool::new(
            "test_tool",
            "A test tool",
            serde_json::json!({"type": "object", "properties": {}}),
        );
        assert_eq!(tool.name, "test_tool");
        assert_eq!(tool.description, "A test tool");
    }

    #[test]
    fn test_outcome_success() {
        let outcome = ToolOutcome::success(serde_json::json!({"x": 1}));
        assert!(outcome.success);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.to_result_content(), "{\"x\":1}");
    }

    #[test]
    fn test_outcome_failure() {
        let outcome = ToolOutcome::failure("failed");
        assert!(!outcome.success);
        assert!(outcome.data.is_none());
        assert_eq!(outcome.to_result_content(), "failed");
    }

    #[test]
    fn test_outcome_serialization_skips_absent_fields() {
        let outcome = ToolOutcome::failure("failed");
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error\":\"failed\""));
        assert!(!json.contains("data"));
    }

    #[test]
    fn test_registry_new_is_empty() {
        let registry = ToolRegistry::new();
        assert_eq!(registry.len(), 0);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_with_builtins() {
        let registry = ToolRegistry::with_builtins();
        assert_eq!(registry.len(), 1);
        assert!(registry.get("get_current_time").is_some());
    }

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        registry.register(Arc::new(FailingTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool_yields_failure_outcome() {
        let registry = ToolRegistry::new();
        let outcome = registry.dispatch("nope", serde_json::json!({})).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Unknown function: nope"));
    }

    #[tokio::test]
    async fn test_dispatch_executor_error_is_captured() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(FailingTool));
        let outcome = registry
            .dispatch("failing_tool", serde_json::json!({}))
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        let outcome = registry
            .dispatch("echo", serde_json::json!({"hello": "world"}))
            .await;
        assert!(outcome.success);
        assert_eq!(outcome.data.unwrap()["hello"], "world");
    }

    #[test]
    fn test_tool_call_record_serialization() {
        let record = ToolCallRecord {
            id: "call_1".to_string(),
            name: "get_current_time".to_string(),
            arguments: serde_json::json!({"format": "iso"}),
            result: Some(ToolOutcome::success(serde_json::json!({"ok": true}))),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"id\":\"call_1\""));
        assert!(json.contains("\"success\":true"));
    }
}
