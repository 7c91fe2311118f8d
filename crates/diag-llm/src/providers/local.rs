//! Local, OpenAI-compatible model server provider (e.g. a llama.cpp or
//! Ollama server running as a sidecar). Offline fallback when no cloud
//! provider is reachable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::wire::{WireBlock, WireContent, to_wire};
use crate::{ChatRequest, ChatResponse, FinishReason, LlmError, LlmProvider, ToolChoice, Usage};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const AVAILABILITY_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// An OpenAI-compatible HTTP endpoint for a locally hosted model.
pub struct LocalProvider {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl LocalProvider {
    /// Creates a provider pointed at `base_url` (e.g.
    /// `http://127.0.0.1:11434`), an OpenAI-compatible chat endpoint. Chat
    /// requests are bounded by `request_timeout` (the configured
    /// `llmRequestTimeoutMs`); the separate, much shorter
    /// `AVAILABILITY_PROBE_TIMEOUT` still governs `is_available`.
    #[must_use]
    pub fn new(base_url: String, model: String, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            client: reqwest::Client::builder().timeout(request_timeout).build().unwrap_or_default(),
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<RequestTool>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct RequestMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<RequestToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone)]
struct RequestToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: RequestFunction,
}

#[derive(Serialize, Deserialize, Clone)]
struct RequestFunction {
    name: String,
    arguments: String,
}

#[derive(Serialize)]
struct RequestTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: RequestToolFunction,
}

#[derive(Serialize)]
struct RequestToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Deserialize)]
struct Response {
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<RequestToolCall>>,
}

#[async_trait::async_trait]
impl LlmProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    fn supports_native_tool_choice(&self) -> bool {
        false
    }

    async fn is_available(&self) -> bool {
        let Ok(response) = self
            .client
            .get(format!("{}/v1/models", self.base_url))
            .timeout(AVAILABILITY_PROBE_TIMEOUT)
            .send()
            .await
        else {
            return false;
        };
        response.status().is_success()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let (system_prompt, wire_messages) = to_wire(&request.messages);

        let mut messages = vec![RequestMessage {
            role: "system".to_string(),
            content: Some(system_prompt),
            tool_calls: None,
            tool_call_id: None,
        }];

        for message in wire_messages {
            match message.content {
                WireContent::Text(text) => messages.push(RequestMessage {
                    role: message.role,
                    content: Some(text),
                    tool_calls: None,
                    tool_call_id: None,
                }),
                WireContent::Blocks(blocks) if message.role == "assistant" => {
                    let tool_calls: Vec<RequestToolCall> = blocks
                        .iter()
                        .filter_map(|b| {
                            if let WireBlock::ToolUse { id, name, input } = b {
                                Some(RequestToolCall {
                                    id: id.clone(),
                                    call_type: "function".to_string(),
                                    function: RequestFunction {
                                        name: name.clone(),
                                        arguments: serde_json::to_string(input).unwrap_or_default(),
                                    },
                                })
                            } else {
                                None
                            }
                        })
                        .collect();
                    let text: String = blocks
                        .iter()
                        .filter_map(|b| if let WireBlock::Text { text } = b { Some(text.as_str()) } else { None })
                        .collect::<Vec<_>>()
                        .join("\n");
                    messages.push(RequestMessage {
                        role: "assistant".to_string(),
                        content: if text.is_empty() { None } else { Some(text) },
                        tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                        tool_call_id: None,
                    });
                }
                WireContent::Blocks(blocks) => {
                    for block in blocks {
                        if let WireBlock::ToolResult { tool_use_id, content } = block {
                            messages.push(RequestMessage {
                                role: "tool".to_string(),
                                content: Some(content),
                                tool_calls: None,
                                tool_call_id: Some(tool_use_id),
                            });
                        }
                    }
                }
            }
        }

        let tools: Vec<RequestTool> = if matches!(request.tool_choice, ToolChoice::None) {
            Vec::new()
        } else {
            request
                .tools
                .iter()
                .map(|t| RequestTool {
                    tool_type: "function".to_string(),
                    function: RequestToolFunction {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters_json_schema(),
                    },
                })
                .collect()
        };

        let body = Request {
            model: &self.model,
            messages,
            tools,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };

        let resp = self.client.post(self.chat_url()).json(&body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(LlmError::Provider {
                message: format!("HTTP {status}: {text}"),
            });
        }

        let parsed: Response = serde_json::from_str(&text)?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| LlmError::Provider {
            message: "no choices in response".to_string(),
        })?;

        let mut blocks = Vec::new();
        if let Some(text) = choice.message.content
            && !text.is_empty()
        {
            blocks.push(WireBlock::Text { text });
        }
        if let Some(tool_calls) = choice.message.tool_calls {
            for call in tool_calls {
                let input = serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
                blocks.push(WireBlock::ToolUse { id: call.id, name: call.function.name, input });
            }
        }

        let has_tool_use = blocks.iter().any(|b| matches!(b, WireBlock::ToolUse { .. }));
        let (response_text, tool_requests) = crate::wire::split_response_blocks(&blocks);

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("tool_calls") => FinishReason::ToolUse,
            Some("length") => FinishReason::MaxTokens,
            _ if has_tool_use => FinishReason::ToolUse,
            _ => FinishReason::EndTurn,
        };

        Ok(ChatResponse {
            text: response_text,
            tool_requests,
            finish_reason,
            usage: Usage::default(),
            provider: self.name().to_string(),
        })
    }
}
