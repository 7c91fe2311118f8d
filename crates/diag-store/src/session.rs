use std::collections::HashSet;

use chrono::{DateTime, Utc};
use diag_types::Message;

use crate::error::StoreError;

const PREVIEW_MAX_LEN: usize = 120;

/// A snapshot view of a session for listing purposes.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    /// The session's opaque ID.
    pub id: String,
    /// When the session was first created.
    pub started: DateTime<Utc>,
    /// Number of messages in the session, including the system prompt.
    pub message_count: usize,
    /// A short preview of the most recent user-visible message, if any.
    pub last_preview: Option<String>,
}

/// Per-session state: the ordered message sequence plus the soft flags the
/// agentic loop reads and writes across a turn.
pub struct SessionState {
    id: String,
    started: DateTime<Utc>,
    messages: Vec<Message>,
    pending_call_ids: HashSet<String>,
    /// `true` until the first user message of the session has been
    /// appended; the loop reads this to decide initial tool forcing.
    pub first_user_turn: bool,
    /// `true` when an action-set tool succeeded this turn and a
    /// verification sub-loop is owed before `Done`.
    pub pending_verification: bool,
}

impl SessionState {
    pub(crate) fn new(id: String, system_prompt: impl Into<String>) -> Self {
        Self {
            id,
            started: Utc::now(),
            messages: vec![Message::System { text: system_prompt.into() }],
            pending_call_ids: HashSet::new(),
            first_user_turn: true,
            pending_verification: false,
        }
    }

    /// Validates and appends `message`, returning its index on success.
    pub(crate) fn push(&mut self, message: Message) -> Result<usize, StoreError> {
        self.validate(&message)?;

        if let Message::Assistant { tool_requests: Some(requests), .. } = &message {
            self.pending_call_ids = requests.iter().map(|r| r.call_id.clone()).collect();
        }
        if matches!(message, Message::User { .. }) {
            self.first_user_turn = false;
        }

        self.messages.push(message);
        Ok(self.messages.len() - 1)
    }

    fn validate(&mut self, message: &Message) -> Result<(), StoreError> {
        if self.messages.is_empty() {
            if matches!(message, Message::System { .. }) {
                return Ok(());
            }
            return Err(StoreError::InvariantViolation {
                reason: "index 0 must be a System message".to_string(),
            });
        }

        match message {
            Message::System { .. } => Err(StoreError::InvariantViolation {
                reason: "only one System message is allowed, at index 0".to_string(),
            }),
            Message::Assistant { text, tool_requests } => {
                if text.is_none() && tool_requests.as_ref().is_none_or(Vec::is_empty) {
                    return Err(StoreError::InvariantViolation {
                        reason: "Assistant message must carry text or tool_requests".to_string(),
                    });
                }
                if matches!(self.messages.last(), Some(Message::Assistant { .. })) {
                    return Err(StoreError::InvariantViolation {
                        reason: "two consecutive Assistant messages without an intervening Tool or User message".to_string(),
                    });
                }
                if !self.pending_call_ids.is_empty() {
                    return Err(StoreError::InvariantViolation {
                        reason: "previous turn's tool requests are still outstanding".to_string(),
                    });
                }
                Ok(())
            }
            Message::Tool { call_id, .. } => {
                if self.pending_call_ids.remove(call_id) {
                    Ok(())
                } else {
                    Err(StoreError::InvariantViolation {
                        reason: format!("tool message call_id '{call_id}' has no matching pending request"),
                    })
                }
            }
            Message::User { .. } => Ok(()),
        }
    }

    pub(crate) fn messages(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub(crate) fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            started: self.started,
            message_count: self.messages.len(),
            last_preview: self.preview(),
        }
    }

    fn preview(&self) -> Option<String> {
        let text = self.messages.iter().rev().find_map(|m| match m {
            Message::User { text, .. } => Some(text.clone()),
            Message::Assistant { text: Some(text), .. } => Some(text.clone()),
            _ => None,
        })?;
        if text.len() > PREVIEW_MAX_LEN {
            Some(format!("{}...", &text[..PREVIEW_MAX_LEN]))
        } else {
            Some(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_types::ToolRequest;
    use serde_json::Map;

    fn assistant_with_tool(call_id: &str) -> Message {
        Message::Assistant {
            text: None,
            tool_requests: Some(vec![ToolRequest {
                call_id: call_id.to_string(),
                name: "ping_gateway".to_string(),
                arguments: Map::new(),
            }]),
        }
    }

    #[test]
    fn first_message_must_be_system() {
        let mut session = SessionState::new("s1".to_string(), "sys");
        assert_eq!(session.messages().len(), 1);
        assert!(matches!(session.messages()[0], Message::System { .. }));
    }

    #[test]
    fn tool_message_requires_matching_pending_call_id() {
        let mut session = SessionState::new("s1".to_string(), "sys");
        session.push(Message::user("hi")).unwrap();
        session.push(assistant_with_tool("c1")).unwrap();

        let err = session
            .push(Message::Tool {
                call_id: "wrong".to_string(),
                tool_name: "ping_gateway".to_string(),
                content: "ok".to_string(),
                success: true,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation { .. }));

        session
            .push(Message::Tool {
                call_id: "c1".to_string(),
                tool_name: "ping_gateway".to_string(),
                content: "ok".to_string(),
                success: true,
            })
            .unwrap();
    }

    #[test]
    fn consecutive_assistant_messages_are_rejected() {
        let mut session = SessionState::new("s1".to_string(), "sys");
        session.push(Message::user("hi")).unwrap();
        session
            .push(Message::Assistant { text: Some("a".to_string()), tool_requests: None })
            .unwrap();
        let err = session
            .push(Message::Assistant { text: Some("b".to_string()), tool_requests: None })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation { .. }));
    }

    #[test]
    fn assistant_with_outstanding_tool_requests_blocks_further_assistant_messages() {
        let mut session = SessionState::new("s1".to_string(), "sys");
        session.push(Message::user("hi")).unwrap();
        session.push(assistant_with_tool("c1")).unwrap();
        let err = session
            .push(Message::Assistant { text: Some("premature".to_string()), tool_requests: None })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvariantViolation { .. }));
    }
}
