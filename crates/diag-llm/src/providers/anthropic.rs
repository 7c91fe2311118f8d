//! Anthropic Claude provider.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::wire::{WireBlock, WireContent, to_wire};
use crate::{ChatRequest, ChatResponse, FinishReason, LlmError, LlmProvider, ToolChoice, Usage};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic Claude API provider.
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider whose requests are bounded by
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
    max_tokens: u32,
    system: &'a str,
    messages: Vec<WireMessageOut>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct WireMessageOut {
    role: String,
    content: serde_json::Value,
}

#[derive(Deserialize)]
struct Response {
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
    usage: Option<ResponseUsage>,
}

#[derive(Deserialize, Default)]
struct ResponseUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn block_to_json(block: &WireBlock) -> serde_json::Value {
    match block {
        WireBlock::Text { text } => serde_json::json!({ "type": "text", "text": text }),
        WireBlock::ToolUse { id, name, input } => serde_json::json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": input,
        }),
        WireBlock::ToolResult { tool_use_id, content } => serde_json::json!({
            "type": "tool_result",
            "tool_use_id": tool_use_id,
            "content": content,
        }),
    }
}

fn tool_choice_json(tool_choice: &ToolChoice) -> Option<serde_json::Value> {
    match tool_choice {
        ToolChoice::Auto => Some(serde_json::json!({ "type": "auto" })),
        ToolChoice::Required => Some(serde_json::json!({ "type": "any" })),
        ToolChoice::Force(name) => Some(serde_json::json!({ "type": "tool", "name": name })),
        ToolChoice::None => None,
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let (system_prompt, wire_messages) = to_wire(&request.messages);

        let api_messages = wire_messages
            .into_iter()
            .map(|m| {
                let content = match m.content {
                    WireContent::Text(text) => serde_json::json!(text),
                    WireContent::Blocks(blocks) => serde_json::json!(blocks.iter().map(block_to_json).collect::<Vec<_>>()),
                };
                WireMessageOut { role: m.role, content }
            })
            .collect();

        let tools = if matches!(request.tool_choice, ToolChoice::None) {
            Vec::new()
        } else {
            request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.parameters_json_schema(),
                    })
                })
                .collect()
        };

        let body = Request {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: &system_prompt,
            messages: api_messages,
            tool_choice: if tools.is_empty() { None } else { tool_choice_json(&request.tool_choice) },
            tools,
            temperature: request.temperature,
        };

        let resp = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
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

        let blocks: Vec<WireBlock> = parsed
            .content
            .into_iter()
            .map(|b| match b {
                ResponseBlock::Text { text } => WireBlock::Text { text },
                ResponseBlock::ToolUse { id, name, input } => WireBlock::ToolUse { id, name, input },
            })
            .collect();
        let (response_text, tool_requests) = crate::wire::split_response_blocks(&blocks);

        let finish_reason = match parsed.stop_reason.as_deref() {
            Some("tool_use") => FinishReason::ToolUse,
            Some("max_tokens") => FinishReason::MaxTokens,
            _ => FinishReason::EndTurn,
        };

        let usage = parsed.usage.unwrap_or_default();

        Ok(ChatResponse {
            text: response_text,
            tool_requests,
            finish_reason,
            usage: Usage {
                tokens_in: usage.input_tokens.unwrap_or(0),
                tokens_out: usage.output_tokens.unwrap_or(0),
            },
            provider: self.name().to_string(),
        })
    }
}
