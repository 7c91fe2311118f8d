use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// A single request from the assistant to invoke a tool.
///
/// `call_id` is unique within the assistant turn that produced it and is
/// echoed back on the matching [`ToolResult`]/[`Message::Tool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequest {
    /// Unique ID for this call within the assistant turn.
    pub call_id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments as supplied by the model. Unknown keys are passed through.
    pub arguments: Map<String, serde_json::Value>,
}

/// The outcome of executing a [`ToolRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    /// The `call_id` of the request this result answers.
    pub call_id: String,
    /// Name of the tool that was executed.
    pub name: String,
    /// Model-facing rendering of the result (see the tool registry's
    /// deterministic template).
    pub content: String,
    /// Whether the tool reported success.
    pub success: bool,
    /// Wall-clock duration of the execution.
    pub duration_ms: u64,
    /// Error detail, present only when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single entry in a session's ordered conversation.
///
/// Invariants enforced by the conversation store, not by this type itself:
/// index 0 is always `System`; a `Tool` message's `call_id` must match a
/// pending request in the immediately preceding `Assistant` turn; no two
/// consecutive `Assistant` messages without an intervening `Tool` (when the
/// prior turn issued tool requests) or `User` message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// The system prompt. Exactly one per session, always at index 0.
    System {
        /// The system prompt text.
        text: String,
    },
    /// A message from the end user.
    User {
        /// The user's text.
        text: String,
        /// When the message was appended.
        timestamp: DateTime<Utc>,
    },
    /// A message from the assistant. At least one of `text` or
    /// `tool_requests` is populated.
    Assistant {
        /// Narrated text, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        /// Tool calls requested by the model, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_requests: Option<Vec<ToolRequest>>,
    },
    /// The result of executing one tool request from the preceding
    /// assistant turn.
    Tool {
        /// The `call_id` of the request this message answers.
        call_id: String,
        /// Name of the tool that was executed.
        tool_name: String,
        /// Model-facing rendering of the result.
        content: String,
        /// Whether the tool reported success.
        success: bool,
    },
}

impl Message {
    /// Convenience constructor for a user message stamped with the current
    /// time.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::User {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Returns the tool requests carried by this message, if it is an
    /// `Assistant` message with any.
    #[must_use]
    pub fn tool_requests(&self) -> Option<&[ToolRequest]> {
        match self {
            Self::Assistant {
                tool_requests: Some(reqs),
                ..
            } => Some(reqs),
            _ => None,
        }
    }

    /// Returns `true` if this message is a `System` message.
    #[must_use]
    pub const fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }

    /// Returns `true` if this message is an `Assistant` message.
    #[must_use]
    pub const fn is_assistant(&self) -> bool {
        matches!(self, Self::Assistant { .. })
    }

    /// Returns the `call_id` this message answers, if it is a `Tool`
    /// message.
    #[must_use]
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::Tool { call_id, .. } => Some(call_id.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_constructor_stamps_timestamp() {
        let before = Utc::now();
        let msg = Message::user("hello");
        let Message::User { text, timestamp } = &msg else {
            panic!("expected User variant");
        };
        assert_eq!(text, "hello");
        assert!(*timestamp >= before);
    }

    #[test]
    fn tool_requests_only_on_assistant_with_requests() {
        let no_tools = Message::Assistant {
            text: Some("hi".to_string()),
            tool_requests: None,
        };
        assert!(no_tools.tool_requests().is_none());

        let req = ToolRequest {
            call_id: "c1".to_string(),
            name: "ping_gateway".to_string(),
            arguments: Map::new(),
        };
        let with_tools = Message::Assistant {
            text: None,
            tool_requests: Some(vec![req]),
        };
        assert_eq!(with_tools.tool_requests().unwrap().len(), 1);
    }

    #[test]
    fn serde_role_tagging_round_trips() {
        let msg = Message::Tool {
            call_id: "c1".to_string(),
            tool_name: "ping_gateway".to_string(),
            content: "ok".to_string(),
            success: true,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"role\":\"tool\""));
        let round_tripped: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(round_tripped.tool_call_id(), Some("c1"));
    }
}
