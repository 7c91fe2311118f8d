use thiserror::Error;

/// Failures from the conversation store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `append` or `messages` was called for a session that was never
    /// created via `session(..)`.
    #[error("no such session: {session_id}")]
    SessionNotFound {
        /// The requested session ID.
        session_id: String,
    },

    /// The message being appended would violate a §3 ordering invariant.
    #[error("invariant violation: {reason}")]
    InvariantViolation {
        /// Human-readable description of the violated invariant.
        reason: String,
    },
}
