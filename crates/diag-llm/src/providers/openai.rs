//! `OpenAI` chat-completions provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::wire::{WireBlock, WireContent, to_wire};
use crate::{ChatRequest, ChatResponse, FinishReason, LlmError, LlmProvider, ToolChoice, Usage};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// `OpenAI` API provider.
pub struct OpenAiProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Creates a new `OpenAI` provider whose requests are bounded by
    /// `request_timeout` (the configured `llmRequestTimeoutMs`).
    #[must_use]
    pub fn new(api_key: String, model: String, request_timeout: Duration) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::builder().timeout(request_timeout).build().unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    model: &'a str,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<RequestTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
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
    usage: Option<ResponseUsage>,
}

#[derive(Deserialize, Default)]
struct ResponseUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
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

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn tool_choice_json(tool_choice: &ToolChoice) -> Option<serde_json::Value> {
    match tool_choice {
        ToolChoice::Auto => Some(serde_json::json!("auto")),
        ToolChoice::Required => Some(serde_json::json!("required")),
        ToolChoice::None => Some(serde_json::json!("none")),
        ToolChoice::Force(name) => Some(serde_json::json!({ "type": "function", "function": { "name": name } })),
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    #[allow(clippy::too_many_lines)]
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
            tool_choice: if tools.is_empty() { None } else { tool_choice_json(&request.tool_choice) },
            tools,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: request.temperature,
        };

        let resp = self
            .client
            .post(API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| format!("HTTP {status}: {text}"));
            return Err(LlmError::Provider { message });
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

        let usage = parsed.usage.unwrap_or_default();

        Ok(ChatResponse {
            text: response_text,
            tool_requests,
            finish_reason,
            usage: Usage {
                tokens_in: usage.prompt_tokens.unwrap_or(0),
                tokens_out: usage.completion_tokens.unwrap_or(0),
            },
            provider: self.name().to_string(),
        })
    }
}
