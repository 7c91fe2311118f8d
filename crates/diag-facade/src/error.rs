use thiserror::Error;

/// Errors surfaced by the session facade, one level above the agentic
/// loop and the conversation store.
#[derive(Debug, Error)]
pub enum FacadeError {
    /// The requested session does not exist.
    #[error("unknown session '{session_id}'")]
    UnknownSession {
        /// The session ID that was not found.
        session_id: String,
    },

    /// The conversation store rejected an operation.
    #[error("conversation store error: {0}")]
    Store(#[from] diag_store::StoreError),

    /// The agentic loop ended the turn fatally.
    #[error("agent loop error: {0}")]
    Agent(#[from] diag_agent::AgentError),

    /// The local-provider sidecar could not be started or did not become
    /// healthy in time.
    #[error("local provider sidecar error: {message}")]
    Sidecar {
        /// Description of what went wrong.
        message: String,
    },
}
