use thiserror::Error;

/// Failures from the LLM adapter layer.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP request to the provider could not be completed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider responded with an error body.
    #[error("provider error: {message}")]
    Provider {
        /// Message extracted from the provider's error response.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// `toolChoice` forcing was violated and no recovery was possible.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of how the forced contract was violated.
        message: String,
    },

    /// No provider in the configured priority list is reachable.
    #[error("no available provider")]
    NoProviderAvailable,

    /// A required configuration value (typically an API key) is missing.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the missing or invalid configuration.
        message: String,
    },
}
