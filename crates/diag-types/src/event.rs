use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Coarse phase of the agentic loop, carried on [`LoopEvent::Status`] so a
/// consumer can render a progress indicator without parsing iteration
/// numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Waiting on the LLM adapter for the next response.
    Thinking,
    /// Dispatching tool requests through the registry.
    ExecutingTools,
    /// Running the post-action verification sub-loop.
    Verifying,
    /// Producing the forced textual summary after the iteration cap.
    Summarizing,
}

/// Aggregated statistics for one completed turn, attached to
/// [`LoopEvent::Done`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnStats {
    /// Number of LLM adapter calls made during the turn.
    pub iteration_count: u32,
    /// Number of tool executions dispatched (after dedup).
    pub tool_count: u32,
    /// Sum of all tool execution durations.
    pub tool_duration_ms: u64,
    /// Whether the verification sub-loop ran.
    pub verified: bool,
}

/// One event streamed from the agentic loop to a session consumer.
///
/// `Done` and `Error` are terminal: no further events follow for the turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// Progress indicator.
    Status {
        /// Coarse phase.
        phase: Phase,
        /// Current iteration number (1-based).
        iteration: u32,
        /// Configured maximum iterations for this turn.
        total: u32,
        /// Human-readable status line.
        message: String,
    },
    /// A chunk of assistant-narrated text.
    Content {
        /// The text chunk.
        text: String,
    },
    /// The loop is about to dispatch a tool call.
    ToolCall {
        /// Tool name.
        name: String,
        /// Arguments as supplied by the model.
        arguments: Map<String, serde_json::Value>,
    },
    /// A tool call has completed.
    ToolResult {
        /// Tool name.
        tool: String,
        /// Whether it succeeded.
        success: bool,
        /// Model-facing rendered content.
        content: String,
    },
    /// The turn completed successfully.
    Done {
        /// Final assistant-facing text.
        final_text: String,
        /// Aggregated statistics for the turn.
        stats: TurnStats,
    },
    /// The turn ended with a fatal error.
    Error {
        /// Description of what went wrong.
        message: String,
    },
}

impl LoopEvent {
    /// Returns `true` for the two terminal variants, `Done` and `Error`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_and_error_are_terminal() {
        assert!(LoopEvent::Done {
            final_text: String::new(),
            stats: TurnStats::default(),
        }
        .is_terminal());
        assert!(
            LoopEvent::Error {
                message: "x".to_string()
            }
            .is_terminal()
        );
        assert!(!LoopEvent::Content { text: "x".to_string() }.is_terminal());
    }

    #[test]
    fn wire_shape_tags_on_type() {
        let json = serde_json::to_value(LoopEvent::Content {
            text: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "content");
        assert_eq!(json["text"], "hi");
    }
}
