//! Anthropic provider implementation
//!
//! Translates the neutral transcript into the Anthropic Messages API
//! content-block format, always attaches the server-side web search tool,
//! and extracts tool-use requests, web-search traces, and citations from
//! the response.

use crate::config::AnthropicConfig;
use crate::error::{Result, WorkdeskError};
use crate::providers::{
    validate_transcript, Attachment, ChatProvider, Citation, GenerationParams, Message,
    ProviderTurn, TokenUsage, ToolCall,
};
use crate::tools::{Tool, ToolCallRecord, ToolOutcome};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider
///
/// The system prompt travels as a top-level field, conversation turns as
/// content-block arrays. Consecutive tool results are merged into a
/// single user turn, which the API requires.
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider instance
    ///
    /// The provider is constructed even without an API key so the server
    /// can start; each completion call reports the missing key as a
    /// configuration error instead.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent("workdesk/0.1.0")
            .build()
            .map_err(|e| WorkdeskError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized Anthropic provider: api_base={}, model={}",
            config.api_base,
            config.model
        );

        Ok(Self { client, config })
    }

    /// Map an attachment's MIME type onto the API's supported image types
    fn supported_media_type(mime: &str) -> Option<&'static str> {
        match mime {
            "image/jpeg" | "image/jpg" => Some("image/jpeg"),
            "image/png" => Some("image/png"),
            "image/gif" => Some("image/gif"),
            "image/webp" => Some("image/webp"),
            _ => None,
        }
    }

    fn attachment_blocks(attachments: &[Attachment]) -> Vec<Value> {
        let mut blocks = Vec::new();
        for attachment in attachments {
            if attachment.is_image() {
                match Self::supported_media_type(&attachment.mime_type) {
                    Some(media_type) => {
                        let data =
                            base64::engine::general_purpose::STANDARD.encode(&attachment.data);
                        blocks.push(json!({
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": media_type,
                                "data": data,
                            }
                        }));
                    }
                    None => {
                        blocks.push(json!({
                            "type": "text",
                            "text": format!(
                                "\n\nUnsupported image format: {} ({}, {})",
                                attachment.name,
                                attachment.mime_type,
                                crate::providers::format_file_size(attachment.size)
                            ),
                        }));
                    }
                }
            } else {
                blocks.push(json!({
                    "type": "text",
                    "text": format!("\n\n{}", attachment.describe()),
                }));
            }
        }
        blocks
    }

    /// Translate the neutral transcript into API messages, returning the
    /// system prompt separately
    fn convert_transcript(&self, transcript: &[Message]) -> (String, Vec<Value>) {
        let validated = validate_transcript(transcript);

        let system = validated
            .iter()
            .filter(|m| m.role == "system")
            .filter_map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut messages: Vec<Value> = Vec::new();
        let mut pending_tool_results: Vec<Value> = Vec::new();

        for message in validated.iter().filter(|m| m.role != "system") {
            if message.role == "tool" {
                // Buffered so consecutive results merge into one user turn.
                pending_tool_results.push(json!({
                    "type": "tool_result",
                    "tool_use_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.content.clone().unwrap_or_default(),
                }));
                continue;
            }

            if !pending_tool_results.is_empty() {
                messages.push(json!({
                    "role": "user",
                    "content": std::mem::take(&mut pending_tool_results),
                }));
            }

            let mut blocks: Vec<Value> = Vec::new();
            if let Some(content) = &message.content {
                if !content.is_empty() {
                    blocks.push(json!({"type": "text", "text": content}));
                }
            }

            if message.role == "user" {
                blocks.extend(Self::attachment_blocks(&message.attachments));
            }

            if let Some(tool_calls) = &message.tool_calls {
                for call in tool_calls {
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": call.id,
                        "name": call.name,
                        "input": call.arguments,
                    }));
                }
            }

            if blocks.is_empty() {
                continue;
            }

            messages.push(json!({
                "role": message.role,
                "content": blocks,
            }));
        }

        if !pending_tool_results.is_empty() {
            messages.push(json!({
                "role": "user",
                "content": pending_tool_results,
            }));
        }

        (system, messages)
    }

    /// Translate tool schemas and append the web search server tool
    fn convert_tools(&self, tools: &[Tool]) -> Vec<Value> {
        let mut converted: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.parameters,
                })
            })
            .collect();

        converted.push(json!({
            "type": "web_search_20250305",
            "name": "web_search",
            "max_uses": self.config.web_search_max_uses,
        }));

        converted
    }

    /// Parse the response content blocks into a provider turn
    fn parse_response(&self, body: Value) -> Result<ProviderTurn> {
        let content = body
            .get("content")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                WorkdeskError::Provider("Anthropic response missing content array".to_string())
            })?;

        let mut text = String::new();
        let mut citations: Vec<Citation> = Vec::new();
        let mut citation_counter = 1;
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut server_tool_uses: Vec<(String, String, Value)> = Vec::new();
        let mut web_search_results: Vec<(String, Value)> = Vec::new();
        let mut saw_text_block = false;

        for block in content {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => {
                    saw_text_block = true;
                    let block_text = block.get("text").and_then(Value::as_str).unwrap_or("");
                    text.push_str(block_text);

                    let mut markers = Vec::new();
                    if let Some(block_citations) = block.get("citations").and_then(Value::as_array)
                    {
                        for citation in block_citations {
                            if citation.get("type").and_then(Value::as_str)
                                == Some("web_search_result_location")
                            {
                                citations.push(Citation {
                                    url: citation
                                        .get("url")
                                        .and_then(Value::as_str)
                                        .unwrap_or_default()
                                        .to_string(),
                                    title: citation
                                        .get("title")
                                        .and_then(Value::as_str)
                                        .unwrap_or_default()
                                        .to_string(),
                                    cited_text: citation
                                        .get("cited_text")
                                        .and_then(Value::as_str)
                                        .unwrap_or_default()
                                        .to_string(),
                                });
                                markers.push(format!("[{}]", citation_counter));
                                citation_counter += 1;
                            }
                        }
                    }
                    text.push_str(&markers.concat());
                }
                Some("tool_use") => {
                    tool_calls.push(ToolCall {
                        id: block
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        name: block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        arguments: block.get("input").cloned().unwrap_or_else(|| json!({})),
                    });
                }
                Some("server_tool_use") => {
                    server_tool_uses.push((
                        block
                            .get("id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        block
                            .get("name")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        block.get("input").cloned().unwrap_or_else(|| json!({})),
                    ));
                }
                Some("web_search_tool_result") => {
                    web_search_results.push((
                        block
                            .get("tool_use_id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        block.get("content").cloned().unwrap_or_else(|| json!([])),
                    ));
                }
                _ => {}
            }
        }

        // Web searches the API ran on its own side are reported in the
        // trace, matched to their results by tool_use_id.
        let server_tool_records: Vec<ToolCallRecord> = server_tool_uses
            .into_iter()
            .filter(|(_, name, _)| name == "web_search")
            .map(|(id, name, input)| {
                let result = web_search_results
                    .iter()
                    .find(|(result_id, _)| *result_id == id)
                    .map(|(_, content)| ToolOutcome::success(content.clone()));
                ToolCallRecord {
                    id,
                    name,
                    arguments: input,
                    result,
                }
            })
            .collect();

        if !saw_text_block && !server_tool_records.is_empty() {
            text = "I executed a search to help answer your question.".to_string();
        }

        let usage = body.get("usage").map(|usage| {
            TokenUsage::new(
                usage
                    .get("input_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
                usage
                    .get("output_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
            )
        });

        Ok(ProviderTurn {
            text,
            tool_calls,
            server_tool_records,
            citations,
            usage,
            raw: Some(body),
        })
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        transcript: &[Message],
        tools: &[Tool],
        params: &GenerationParams,
    ) -> Result<ProviderTurn> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .ok_or(WorkdeskError::MissingApiKey("anthropic".to_string()))?;

        let (system, messages) = self.convert_transcript(transcript);
        let model = params.model.as_deref().unwrap_or(&self.config.model);
        let max_tokens = params.max_tokens.unwrap_or(self.config.max_tokens);

        let request = json!({
            "model": model,
            "max_tokens": max_tokens,
            "system": system,
            "tools": self.convert_tools(tools),
            "messages": messages,
        });

        let url = format!("{}/v1/messages", self.config.api_base);
        tracing::debug!("Calling Anthropic: model={}", model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                crate::metrics::record_provider_error("anthropic");
                WorkdeskError::Provider(format!("Failed to reach Anthropic API: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            crate::metrics::record_provider_error("anthropic");
            tracing::error!("Anthropic returned error {}: {}", status, error_text);
            return Err(WorkdeskError::Provider(format!(
                "Anthropic returned error {}: {}",
                status, error_text
            ))
            .into());
        }

        let body: Value = response.json().await.map_err(|e| {
            WorkdeskError::Provider(format!("Failed to parse Anthropic response: {}", e))
        })?;

        self.parse_response(body)
    }
}
