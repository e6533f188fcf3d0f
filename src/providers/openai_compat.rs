//! OpenAI-compatible provider implementation
//!
//! One adapter covers every provider that speaks the OpenAI
//! chat-completions wire format; OpenAI itself, Cerebras, and the local
//! Ollama-compatible endpoint differ only in endpoint, credentials,
//! defaults, and capability flags, captured here as profiles. This
//! replaces what would otherwise be three near-identical translation
//! layers.

use crate::config::{CerebrasConfig, LocalProviderConfig, OpenAiConfig};
use crate::error::{Result, WorkdeskError};
use crate::providers::{
    validate_transcript, Attachment, ChatProvider, GenerationParams, Message, ProviderTurn,
    ReasoningEffort, TextStream, TokenUsage, ToolCall,
};
use crate::tools::Tool;
use async_trait::async_trait;
use base64::Engine;
use futures::StreamExt;
use reqwest::Client;
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;

/// Default sampling parameters, used by the local profile
#[derive(Debug, Clone, Copy)]
struct Sampling {
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
}

/// Endpoint, credentials, defaults, and capability flags for one member
/// of the OpenAI-compatible family
struct Profile {
    label: &'static str,
    chat_url: String,
    api_key: Option<String>,
    requires_api_key: bool,
    default_model: String,
    default_reasoning_effort: Option<ReasoningEffort>,
    supports_reasoning_effort: bool,
    supports_streaming: bool,
    sampling: Option<Sampling>,
}

/// Chat provider for OpenAI-compatible endpoints
pub struct OpenAiCompatProvider {
    client: Client,
    profile: Profile,
}

impl OpenAiCompatProvider {
    fn with_profile(profile: Profile) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent("workdesk/0.1.0")
            .build()
            .map_err(|e| WorkdeskError::Provider(format!("Failed to create HTTP client: {}", e)))?;

        tracing::info!(
            "Initialized {} provider: url={}, model={}",
            profile.label,
            profile.chat_url,
            profile.default_model
        );

        Ok(Self { client, profile })
    }

    /// Create the OpenAI provider
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn openai(config: OpenAiConfig) -> Result<Self> {
        Self::with_profile(Profile {
            label: "openai",
            chat_url: format!("{}/chat/completions", config.api_base),
            api_key: config.api_key,
            requires_api_key: true,
            default_model: config.model,
            default_reasoning_effort: None,
            supports_reasoning_effort: true,
            supports_streaming: false,
            sampling: None,
        })
    }

    /// Create the Cerebras provider
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn cerebras(config: CerebrasConfig) -> Result<Self> {
        let default_effort = ReasoningEffort::from_str(&config.reasoning_effort).ok();
        Self::with_profile(Profile {
            label: "cerebras",
            chat_url: format!("{}/chat/completions", config.api_base),
            api_key: config.api_key,
            requires_api_key: true,
            default_model: config.model,
            default_reasoning_effort: default_effort,
            supports_reasoning_effort: true,
            supports_streaming: true,
            sampling: None,
        })
    }

    /// Create the local Ollama-compatible provider
    ///
    /// The local endpoint requires no API key and accepts sampling
    /// parameters on every request.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    pub fn local(config: LocalProviderConfig) -> Result<Self> {
        Self::with_profile(Profile {
            label: "local",
            chat_url: format!("{}/v1/chat/completions", config.host),
            api_key: None,
            requires_api_key: false,
            default_model: config.model,
            default_reasoning_effort: None,
            supports_reasoning_effort: false,
            supports_streaming: true,
            sampling: Some(Sampling {
                temperature: config.temperature,
                top_p: config.top_p,
                max_tokens: config.max_completion_tokens,
            }),
        })
    }

    fn api_key(&self) -> Result<Option<&str>> {
        if !self.profile.requires_api_key {
            return Ok(self.profile.api_key.as_deref());
        }
        self.profile
            .api_key
            .as_deref()
            .filter(|key| !key.is_empty())
            .map(Some)
            .ok_or_else(|| WorkdeskError::MissingApiKey(self.profile.label.to_string()).into())
    }

    fn user_content(message: &Message) -> Value {
        let text = message.content.clone().unwrap_or_default();
        if message.attachments.is_empty() {
            return json!(text);
        }

        let mut parts = vec![json!({"type": "text", "text": text})];
        for attachment in &message.attachments {
            if attachment.is_image() {
                let data = base64::engine::general_purpose::STANDARD.encode(&attachment.data);
                let data_url = format!("data:{};base64,{}", attachment.mime_type, data);
                parts.push(json!({
                    "type": "image_url",
                    "image_url": {"url": data_url, "detail": "auto"},
                }));
            } else {
                parts.push(json!({
                    "type": "text",
                    "text": format!("\n\n{}", attachment.describe()),
                }));
            }
        }
        json!(parts)
    }

    fn convert_tool_calls(calls: &[ToolCall]) -> Value {
        json!(calls
            .iter()
            .map(|call| {
                json!({
                    "id": call.id,
                    "type": "function",
                    "function": {
                        "name": call.name,
                        "arguments": call.arguments.to_string(),
                    },
                })
            })
            .collect::<Vec<_>>())
    }

    fn convert_transcript(&self, transcript: &[Message]) -> Vec<Value> {
        validate_transcript(transcript)
            .iter()
            .filter_map(|message| match message.role.as_str() {
                "system" => Some(json!({
                    "role": "system",
                    "content": message.content.clone().unwrap_or_default(),
                })),
                "user" => Some(json!({
                    "role": "user",
                    "content": Self::user_content(message),
                })),
                "assistant" => {
                    let mut wire = json!({
                        "role": "assistant",
                        "content": message.content.clone(),
                    });
                    if let Some(calls) = &message.tool_calls {
                        wire["tool_calls"] = Self::convert_tool_calls(calls);
                    }
                    Some(wire)
                }
                "tool" => Some(json!({
                    "role": "tool",
                    "tool_call_id": message.tool_call_id.clone().unwrap_or_default(),
                    "content": message.content.clone().unwrap_or_default(),
                })),
                _ => None,
            })
            .collect()
    }

    fn convert_tools(tools: &[Tool]) -> Vec<Value> {
        tools
            .iter()
            .map(|tool| {
                json!({
                    "type": "function",
                    "function": {
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    },
                })
            })
            .collect()
    }

    fn build_request(
        &self,
        transcript: &[Message],
        tools: &[Tool],
        params: &GenerationParams,
        stream: bool,
    ) -> Value {
        let model = params
            .model
            .as_deref()
            .unwrap_or(&self.profile.default_model);

        let mut request = json!({
            "model": model,
            "messages": self.convert_transcript(transcript),
            "stream": stream,
        });

        if !stream && !tools.is_empty() {
            request["tools"] = json!(Self::convert_tools(tools));
            request["tool_choice"] = json!("auto");
        }

        if self.profile.supports_reasoning_effort {
            let effort = params
                .reasoning_effort
                .or(self.profile.default_reasoning_effort);
            if let Some(effort) = effort {
                request["reasoning_effort"] = json!(effort.as_str());
            }
        }

        if let Some(sampling) = self.profile.sampling {
            request["temperature"] = json!(params.temperature.unwrap_or(sampling.temperature));
            request["top_p"] = json!(params.top_p.unwrap_or(sampling.top_p));
            request["max_tokens"] = json!(params.max_tokens.unwrap_or(sampling.max_tokens));
        }

        request
    }

    async fn send(&self, request: &Value) -> Result<reqwest::Response> {
        let mut builder = self.client.post(&self.profile.chat_url).json(request);
        if let Some(key) = self.api_key()? {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            crate::metrics::record_provider_error(self.profile.label);
            WorkdeskError::Provider(format!(
                "Failed to reach {} API: {}",
                self.profile.label, e
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            crate::metrics::record_provider_error(self.profile.label);
            tracing::error!(
                "{} returned error {}: {}",
                self.profile.label,
                status,
                error_text
            );
            return Err(WorkdeskError::Provider(format!(
                "{} returned error {}: {}",
                self.profile.label, status, error_text
            ))
            .into());
        }

        Ok(response)
    }

    fn parse_response(&self, body: Value) -> Result<ProviderTurn> {
        let message = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .ok_or_else(|| {
                WorkdeskError::Provider(format!(
                    "{} response missing choices[0].message",
                    self.profile.label
                ))
            })?;

        let text = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();

        let tool_calls = message
            .get("tool_calls")
            .and_then(Value::as_array)
            .map(|calls| {
                calls
                    .iter()
                    .filter(|call| {
                        call.get("type").and_then(Value::as_str).unwrap_or("function")
                            == "function"
                    })
                    .map(|call| {
                        let function = call.get("function").cloned().unwrap_or_else(|| json!({}));
                        let arguments = match function.get("arguments") {
                            Some(Value::String(raw)) => serde_json::from_str(raw)
                                .unwrap_or_else(|e| {
                                    tracing::warn!("Failed to parse tool arguments: {}", e);
                                    json!({})
                                }),
                            Some(value) => value.clone(),
                            None => json!({}),
                        };
                        let id = call
                            .get("id")
                            .and_then(Value::as_str)
                            .filter(|id| !id.is_empty())
                            .map(str::to_string)
                            .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4()));
                        ToolCall {
                            id,
                            name: function
                                .get("name")
                                .and_then(Value::as_str)
                                .unwrap_or_default()
                                .to_string(),
                            arguments,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage = body.get("usage").map(|usage| {
            TokenUsage::new(
                usage
                    .get("prompt_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
                usage
                    .get("completion_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0) as usize,
            )
        });

        Ok(ProviderTurn {
            text,
            tool_calls,
            server_tool_records: Vec::new(),
            citations: Vec::new(),
            usage,
            raw: Some(body),
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.profile.label
    }

    async fn complete(
        &self,
        transcript: &[Message],
        tools: &[Tool],
        params: &GenerationParams,
    ) -> Result<ProviderTurn> {
        let request = self.build_request(transcript, tools, params, false);
        tracing::debug!(
            "Calling {}: model={}",
            self.profile.label,
            request["model"]
        );

        let response = self.send(&request).await?;
        let body: Value = response.json().await.map_err(|e| {
            WorkdeskError::Provider(format!(
                "Failed to parse {} response: {}",
                self.profile.label, e
            ))
        })?;

        self.parse_response(body)
    }

    async fn stream(
        &self,
        transcript: &[Message],
        params: &GenerationParams,
    ) -> Result<TextStream> {
        if !self.profile.supports_streaming {
            return Err(WorkdeskError::StreamingNotSupported.into());
        }

        let request = self.build_request(transcript, &[], params, true);
        let response = self.send(&request).await?;
        let label = self.profile.label;

        // Server-sent events: one `data: {json}` line per chunk, closed by
        // `data: [DONE]`. Bytes are buffered until a full line is present.
        let bytes = response.bytes_stream().boxed();
        let stream = futures::stream::unfold(
            (bytes, String::new(), false),
            move |(mut bytes, mut buffer, finished)| async move {
                if finished {
                    return None;
                }
                loop {
                    if let Some(pos) = buffer.find('\n') {
                        let line: String = buffer.drain(..=pos).collect();
                        let line = line.trim();
                        let Some(data) = line.strip_prefix("data: ") else {
                            continue;
                        };
                        if data == "[DONE]" {
                            return None;
                        }
                        let Ok(chunk) = serde_json::from_str::<Value>(data) else {
                            tracing::warn!("Skipping malformed {} stream chunk", label);
                            continue;
                        };
                        let delta = chunk["choices"][0]["delta"]["content"]
                            .as_str()
                            .unwrap_or("")
                            .to_string();
                        if delta.is_empty() {
                            continue;
                        }
                        return Some((Ok::<String, anyhow::Error>(delta), (bytes, buffer, false)));
                    }

                    match bytes.next().await {
                        Some(Ok(chunk)) => {
                            buffer.push_str(&String::from_utf8_lossy(&chunk));
                        }
                        Some(Err(e)) => {
                            let err = WorkdeskError::Provider(format!(
                                "{} stream failed: {}",
                                label, e
                            ));
                            return Some((Err(err.into()), (bytes, buffer, true)));
                        }
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}
