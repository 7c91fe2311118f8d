use thiserror::Error;

/// Errors that can terminate a turn before `Done` is emitted.
///
/// Each variant corresponds to one of the fatal propagation policies in
/// the error handling design: store invariant violations, exhausted LLM
/// fallback, and cancellation are all turn-ending.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The conversation store rejected an append (unknown session, or an
    /// ordering invariant violation).
    #[error("conversation store error: {0}")]
    Store(#[from] diag_store::StoreError),

    /// The LLM adapter could not produce a response: no provider
    /// available, a transport failure with fallback exhausted, or an
    /// application-level protocol error that survived the forcing retry.
    #[error("LLM adapter error: {0}")]
    Llm(#[from] diag_llm::LlmError),

    /// The turn was cancelled via the caller's cancellation signal.
    #[error("turn cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_has_a_stable_message() {
        assert_eq!(AgentError::Cancelled.to_string(), "turn cancelled");
    }
}
