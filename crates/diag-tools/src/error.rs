use thiserror::Error;

/// Registration-time failures. Dispatch-time failures never reach the
/// caller as `Err`; they are folded into an error-shaped [`diag_types::message::ToolResult`]
/// instead, per the registry's "never raises on execute" contract.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("a tool named '{name}' is already registered")]
    DuplicateName { name: String },
}
