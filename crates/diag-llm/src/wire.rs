//! Provider-agnostic wire representation of a conversation, translated
//! from/to [`diag_types::Message`].
//!
//! Every provider converts through this shape rather than reading
//! [`diag_types::Message`] directly, keeping provider-specific JSON
//! entirely out of the core.

use diag_types::{Message, ToolRequest};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One turn in provider-facing shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    /// `"user"`, `"assistant"`, or `"tool"`.
    pub role: String,
    /// Message content.
    pub content: WireContent,
}

/// Content of a [`WireMessage`]: either plain text or structured blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    /// Simple text content.
    Text(String),
    /// Structured content blocks (tool use, tool results).
    Blocks(Vec<WireBlock>),
}

/// A structured content block within a [`WireMessage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireBlock {
    /// Narrated text.
    Text {
        /// The text.
        text: String,
    },
    /// A tool invocation requested by the assistant.
    ToolUse {
        /// Unique ID for this call.
        id: String,
        /// Tool name.
        name: String,
        /// Arguments the model supplied.
        input: Value,
    },
    /// The result of a previously requested tool call.
    ToolResult {
        /// The `id` of the matching [`WireBlock::ToolUse`].
        tool_use_id: String,
        /// Rendered result content.
        content: String,
    },
}

/// Splits a session's message sequence into a system prompt and the
/// provider-facing turn history. Assumes index 0 is `Message::System`, as
/// the conversation store guarantees.
#[must_use]
pub fn to_wire(messages: &[Message]) -> (String, Vec<WireMessage>) {
    let mut system_prompt = String::new();
    let mut wire = Vec::with_capacity(messages.len());

    for message in messages {
        match message {
            Message::System { text } => system_prompt = text.clone(),
            Message::User { text, .. } => wire.push(WireMessage {
                role: "user".to_string(),
                content: WireContent::Text(text.clone()),
            }),
            Message::Assistant { text, tool_requests } => {
                let mut blocks = Vec::new();
                if let Some(text) = text {
                    blocks.push(WireBlock::Text { text: text.clone() });
                }
                if let Some(requests) = tool_requests {
                    for request in requests {
                        blocks.push(WireBlock::ToolUse {
                            id: request.call_id.clone(),
                            name: request.name.clone(),
                            input: Value::Object(request.arguments.clone()),
                        });
                    }
                }
                wire.push(WireMessage {
                    role: "assistant".to_string(),
                    content: WireContent::Blocks(blocks),
                });
            }
            Message::Tool { call_id, content, .. } => wire.push(WireMessage {
                role: "user".to_string(),
                content: WireContent::Blocks(vec![WireBlock::ToolResult {
                    tool_use_id: call_id.clone(),
                    content: content.clone(),
                }]),
            }),
        }
    }

    (system_prompt, wire)
}

/// Extracts narrated text and tool requests from a provider's response
/// blocks, in the order the provider emitted them.
#[must_use]
pub fn split_response_blocks(blocks: &[WireBlock]) -> (Option<String>, Vec<ToolRequest>) {
    let mut text_parts = Vec::new();
    let mut requests = Vec::new();

    for block in blocks {
        match block {
            WireBlock::Text { text } => text_parts.push(text.clone()),
            WireBlock::ToolUse { id, name, input } => requests.push(ToolRequest {
                call_id: id.clone(),
                name: name.clone(),
                arguments: input.as_object().cloned().unwrap_or_else(Map::new),
            }),
            WireBlock::ToolResult { .. } => {}
        }
    }

    let text = if text_parts.is_empty() { None } else { Some(text_parts.join("\n")) };
    (text, requests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map as JsonMap;

    #[test]
    fn system_message_becomes_the_system_prompt_and_is_not_in_wire_history() {
        let messages = vec![Message::System { text: "be helpful".to_string() }, Message::user("hi")];
        let (system_prompt, wire) = to_wire(&messages);
        assert_eq!(system_prompt, "be helpful");
        assert_eq!(wire.len(), 1);
    }

    #[test]
    fn tool_result_message_becomes_a_tool_result_block() {
        let messages = vec![
            Message::System { text: "sys".to_string() },
            Message::Tool {
                call_id: "c1".to_string(),
                tool_name: "ping_gateway".to_string(),
                content: "ok".to_string(),
                success: true,
            },
        ];
        let (_, wire) = to_wire(&messages);
        let WireContent::Blocks(blocks) = &wire[0].content else {
            panic!("expected blocks");
        };
        assert!(matches!(blocks[0], WireBlock::ToolResult { .. }));
    }

    #[test]
    fn split_response_blocks_separates_text_from_tool_requests() {
        let blocks = vec![
            WireBlock::Text { text: "checking now".to_string() },
            WireBlock::ToolUse {
                id: "c1".to_string(),
                name: "ping_gateway".to_string(),
                input: Value::Object(JsonMap::new()),
            },
        ];
        let (text, requests) = split_response_blocks(&blocks);
        assert_eq!(text.as_deref(), Some("checking now"));
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "ping_gateway");
    }
}
