//! Best-effort `toolChoice` emulation for providers without native forcing
//! support: an imperative instruction is appended to the final user
//! message.

use diag_types::Message;

use crate::{ChatRequest, ToolChoice};

fn instruction_for(tool_choice: &ToolChoice) -> Option<&'static str> {
    match tool_choice {
        ToolChoice::Required => Some("[INSTRUCTION: You must respond with a tool call.]"),
        ToolChoice::None => Some("[INSTRUCTION: Respond with plain text only, no tool calls.]"),
        ToolChoice::Auto | ToolChoice::Force(_) => None,
    }
}

/// Returns a copy of `request` with a forcing instruction appended to the
/// final user message, when one applies. `Force(name)` is left to the
/// caller since it needs to name a specific tool; most local/offline
/// providers used here are only exercised with `auto`/`required`/`none`.
#[must_use]
pub fn inject_force_instruction(request: &ChatRequest) -> ChatRequest {
    let Some(instruction) = instruction_for(&request.tool_choice) else {
        return request.clone();
    };

    let mut messages = request.messages.clone();
    if let Some(last_user) = messages.iter_mut().rev().find(|m| matches!(m, Message::User { .. })) {
        if let Message::User { text, .. } = last_user {
            text.push(' ');
            text.push_str(instruction);
        }
    }

    ChatRequest { messages, ..request.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_types::ToolDefinition;

    fn request(tool_choice: ToolChoice) -> ChatRequest {
        ChatRequest {
            messages: vec![Message::System { text: "sys".to_string() }, Message::user("is my wifi broken")],
            tools: Vec::<ToolDefinition>::new(),
            tool_choice,
            temperature: None,
            max_tokens: None,
        }
    }

    #[test]
    fn required_choice_appends_tool_call_instruction() {
        let injected = inject_force_instruction(&request(ToolChoice::Required));
        let Message::User { text, .. } = &injected.messages[1] else {
            panic!("expected user message");
        };
        assert!(text.contains("You must respond with a tool call"));
    }

    #[test]
    fn auto_choice_is_left_unchanged() {
        let original = request(ToolChoice::Auto);
        let injected = inject_force_instruction(&original);
        let Message::User { text, .. } = &injected.messages[1] else {
            panic!("expected user message");
        };
        assert_eq!(text, "is my wifi broken");
    }
}
