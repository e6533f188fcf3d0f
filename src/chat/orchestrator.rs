//! Tool-calling orchestration loop
//!
//! One bounded, provider-agnostic loop drives every chat turn: send the
//! transcript and tool catalog, execute any requested tools concurrently,
//! feed the results back, and repeat until the provider answers without
//! tool calls or the round budget runs out.

use crate::chat::{build_system_prompt, ChatOutcome, ChatRequest};
use crate::config::{ChatConfig, RoundLimitBehavior};
use crate::error::{Result, WorkdeskError};
use crate::providers::{ChatProvider, GenerationParams, Message, TextStream};
use crate::tools::{ToolCallRecord, ToolRegistry};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Message returned when the round budget is exhausted in fallback mode
pub const FALLBACK_MESSAGE: &str =
    "I apologize, but I encountered an error processing your request. Please try again.";

/// Message substituted when the final round carried no text but tools ran
const TOOLS_ONLY_MESSAGE: &str = "Tools executed successfully!";

/// Drives a bounded tool-calling conversation with one provider
///
/// # Examples
///
/// ```ignore
/// use workdesk::chat::{ChatRequest, Orchestrator};
/// use workdesk::config::ChatConfig;
/// use workdesk::tools::ToolRegistry;
/// use std::sync::Arc;
///
/// # async fn example() -> workdesk::error::Result<()> {
/// # let provider = unimplemented!();
/// let tools = Arc::new(ToolRegistry::with_builtins());
/// let orchestrator = Orchestrator::new(provider, tools, &ChatConfig::default())?;
/// let outcome = orchestrator.run(&ChatRequest {
///     message: "What time is it in UTC?".to_string(),
///     ..ChatRequest::default()
/// }).await?;
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator {
    provider: Arc<dyn ChatProvider>,
    tools: Arc<ToolRegistry>,
    max_rounds: usize,
    history_limit: usize,
    on_round_limit: RoundLimitBehavior,
}

impl Orchestrator {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `provider` - The chat provider to converse with
    /// * `tools` - The tool registry holding the static catalog
    /// * `config` - Loop configuration (round budget, history cap,
    ///   round-limit behavior)
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::Config` if `max_rounds` is zero
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        tools: Arc<ToolRegistry>,
        config: &ChatConfig,
    ) -> Result<Self> {
        if config.max_rounds == 0 {
            return Err(
                WorkdeskError::Config("max_rounds must be greater than 0".to_string()).into(),
            );
        }

        Ok(Self {
            provider,
            tools,
            max_rounds: config.max_rounds,
            history_limit: config.history_limit,
            on_round_limit: config.on_round_limit,
        })
    }

    /// The provider this orchestrator converses with
    pub fn provider(&self) -> &Arc<dyn ChatProvider> {
        &self.provider
    }

    /// Runs the tool-calling loop for one chat turn
    ///
    /// Each round sends the full transcript and tool catalog to the
    /// provider. A response with no tool calls is final. Otherwise every
    /// requested tool is executed concurrently, the results are appended
    /// as tool-result turns tagged with their call ids, and the loop
    /// continues. Rounds are strictly sequential; only tool execution
    /// within a round fans out.
    ///
    /// # Errors
    ///
    /// - `WorkdeskError::RoundLimitExceeded` when the budget is exhausted
    ///   and the loop is configured to surface it
    /// - Provider errors propagate unchanged; no retries are attempted
    pub async fn run(&self, request: &ChatRequest) -> Result<ChatOutcome> {
        let mut transcript = self.build_transcript(request);
        let definitions = self.tools.definitions();
        let mut records: Vec<ToolCallRecord> = Vec::new();

        info!(
            provider = self.provider.name(),
            rounds = self.max_rounds,
            "Starting chat turn"
        );

        for round in 1..=self.max_rounds {
            debug!(
                provider = self.provider.name(),
                round,
                transcript_len = transcript.len(),
                "Requesting completion"
            );

            let turn = self
                .provider
                .complete(&transcript, &definitions, &request.params)
                .await?;
            crate::metrics::record_chat_round(self.provider.name());

            if !turn.has_tool_calls() {
                records.extend(turn.server_tool_records);
                let message = if turn.text.is_empty() {
                    if records.is_empty() {
                        FALLBACK_MESSAGE.to_string()
                    } else {
                        TOOLS_ONLY_MESSAGE.to_string()
                    }
                } else {
                    turn.text
                };

                info!(
                    provider = self.provider.name(),
                    rounds_used = round,
                    tool_calls = records.len(),
                    "Chat turn completed"
                );

                return Ok(ChatOutcome {
                    message,
                    tool_calls: records,
                    citations: turn.citations,
                    raw_response: turn.raw,
                });
            }

            debug!(
                round,
                count = turn.tool_calls.len(),
                "Executing requested tools"
            );

            // All tool calls of a round run concurrently; their results
            // are appended in request order, tagged by call id.
            let outcomes = futures::future::join_all(turn.tool_calls.iter().map(|call| {
                let tools = Arc::clone(&self.tools);
                async move { tools.dispatch(&call.name, call.arguments.clone()).await }
            }))
            .await;

            let text = if turn.text.is_empty() {
                None
            } else {
                Some(turn.text.clone())
            };
            transcript.push(Message::assistant_with_tools(text, turn.tool_calls.clone()));

            for (call, outcome) in turn.tool_calls.iter().zip(outcomes) {
                crate::metrics::record_tool_execution(&call.name, outcome.success);
                transcript.push(Message::tool_result(&call.id, outcome.to_result_content()));
                records.push(ToolCallRecord {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                    result: Some(outcome),
                });
            }
        }

        warn!(
            provider = self.provider.name(),
            limit = self.max_rounds,
            "Round budget exhausted without a tool-call-free response"
        );

        match self.on_round_limit {
            RoundLimitBehavior::Fallback => Ok(ChatOutcome {
                message: FALLBACK_MESSAGE.to_string(),
                tool_calls: records,
                citations: Vec::new(),
                raw_response: None,
            }),
            RoundLimitBehavior::Error => Err(WorkdeskError::RoundLimitExceeded {
                limit: self.max_rounds,
            }
            .into()),
        }
    }

    /// Streams a completion, bypassing the tool-calling loop
    ///
    /// # Errors
    ///
    /// Returns `WorkdeskError::StreamingNotSupported` for providers
    /// without streaming support.
    pub async fn run_streaming(&self, request: &ChatRequest) -> Result<TextStream> {
        let transcript = self.build_transcript(request);
        info!(provider = self.provider.name(), "Starting streaming turn");
        self.provider.stream(&transcript, &request.params).await
    }

    fn build_transcript(&self, request: &ChatRequest) -> Vec<Message> {
        let mut transcript =
            vec![Message::system(build_system_prompt(request.context.as_ref()))];

        let history: Vec<&Message> = request
            .history
            .iter()
            .filter(|m| m.role != "system")
            .collect();
        let skip = history.len().saturating_sub(self.history_limit);
        transcript.extend(history.into_iter().skip(skip).cloned());

        transcript.push(Message::user_with_attachments(
            request.message.clone(),
            request.attachments.clone(),
        ));

        transcript
    }
}
