#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! LLM adapter: a uniform `chat(request) -> response` over heterogeneous
//! chat-completion providers, with priority-ordered provider selection and
//! opportunistic transport-level fallback.

mod emulate;
mod error;
mod providers;
mod wire;

use std::sync::Arc;
use std::time::Instant;

use diag_types::{Message, ToolDefinition, ToolRequest};

pub use error::LlmError;
pub use providers::anthropic::AnthropicProvider;
pub use providers::local::LocalProvider;
pub use providers::openai::OpenAiProvider;
pub use wire::{WireBlock, WireContent, WireMessage};

/// The model-side directive governing whether a tool invocation is
/// mandatory, forbidden, or at the model's discretion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// The provider may emit text or tool requests.
    Auto,
    /// The provider must emit at least one tool request.
    Required,
    /// The provider must not emit tool requests.
    None,
    /// The provider must emit a tool request for the named tool.
    Force(String),
}

/// A normalized chat request, independent of the serving provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Full session history, including the leading `System` message.
    pub messages: Vec<Message>,
    /// Tool catalog to offer the model.
    pub tools: Vec<ToolDefinition>,
    /// Forcing directive for this call.
    pub tool_choice: ToolChoice,
    /// Sampling temperature, if the caller wants to override the
    /// provider's default.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
}

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The model finished its turn naturally.
    EndTurn,
    /// The model wants to call one or more tools.
    ToolUse,
    /// The token budget was exhausted mid-generation.
    MaxTokens,
}

/// Token accounting for one request, as reported by the provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    /// Prompt tokens consumed.
    pub tokens_in: u32,
    /// Completion tokens generated.
    pub tokens_out: u32,
}

/// A normalized chat response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Narrated text, if any.
    pub text: Option<String>,
    /// Tool calls the model requested, if any.
    pub tool_requests: Vec<ToolRequest>,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Token usage for this call.
    pub usage: Usage,
    /// Name of the provider that actually served the request.
    pub provider: String,
}

/// One chat-completion backend.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// The provider's name, used for logging and `ChatResponse::provider`.
    fn name(&self) -> &'static str;

    /// Whether this provider supports native `tool_choice` forcing. When
    /// `false`, the adapter emulates forcing via an injected instruction.
    fn supports_native_tool_choice(&self) -> bool {
        true
    }

    /// Cheap reachability check, consulted before a provider is tried.
    async fn is_available(&self) -> bool;

    /// Sends one chat-completion request.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::Transport`] on a network-level failure (eligible
    /// for fallback), or [`LlmError::Provider`]/[`LlmError::MalformedResponse`]
    /// for application-level failures (not retried).
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}

/// Invoked after every completed (successful) chat call.
pub type LlmCallHook = Arc<dyn Fn(&str, &str, u64, u32, u32) + Send + Sync>;

/// Owns a priority-ordered list of providers and implements opportunistic
/// transport-level fallback.
pub struct LlmAdapter {
    providers: Vec<Box<dyn LlmProvider>>,
    on_llm_call: Option<LlmCallHook>,
}

impl LlmAdapter {
    /// Builds an adapter over `providers`, tried in the given priority
    /// order.
    #[must_use]
    pub fn new(providers: Vec<Box<dyn LlmProvider>>) -> Self {
        Self { providers, on_llm_call: None }
    }

    /// Attaches a hook invoked as `(sessionId, provider, durationMs,
    /// tokensIn, tokensOut)` after every completed call.
    #[must_use]
    pub fn with_llm_call_hook(mut self, hook: LlmCallHook) -> Self {
        self.on_llm_call = Some(hook);
        self
    }

    /// Sends `request` to the highest-priority available provider, falling
    /// back to the next available one exactly once on a transport error.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::NoProviderAvailable`] if no configured provider
    /// is reachable, or the underlying provider error if forcing semantics
    /// are violated or an application-level error occurs.
    pub async fn chat(&self, session_id: &str, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let mut available = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            if provider.is_available().await {
                available.push(provider.as_ref());
            }
        }

        let Some((primary, rest)) = available.split_first() else {
            return Err(LlmError::NoProviderAvailable);
        };

        match self.call_one(*primary, request, session_id).await {
            Ok(response) => Ok(response),
            Err(LlmError::Transport(err)) => {
                log::warn!("provider '{}' transport error, attempting fallback: {err}", primary.name());
                let Some(fallback) = rest.first() else {
                    return Err(LlmError::Transport(err));
                };
                self.call_one(*fallback, request, session_id).await
            }
            Err(other) => Err(other),
        }
    }

    async fn call_one(&self, provider: &dyn LlmProvider, request: &ChatRequest, session_id: &str) -> Result<ChatResponse, LlmError> {
        let effective_request = if provider.supports_native_tool_choice() {
            request.clone()
        } else {
            emulate::inject_force_instruction(request)
        };

        let start = Instant::now();
        let response = provider.chat(&effective_request).await?;
        enforce_tool_choice(&request.tool_choice, &response)?;

        if let Some(hook) = &self.on_llm_call {
            let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            hook(session_id, &response.provider, duration_ms, response.usage.tokens_in, response.usage.tokens_out);
        }
        Ok(response)
    }
}

fn enforce_tool_choice(tool_choice: &ToolChoice, response: &ChatResponse) -> Result<(), LlmError> {
    match tool_choice {
        ToolChoice::Required if response.tool_requests.is_empty() => Err(LlmError::Protocol {
            message: "toolChoice=required but the provider returned text only".to_string(),
        }),
        ToolChoice::Force(name) if !response.tool_requests.iter().any(|r| &r.name == name) => Err(LlmError::Protocol {
            message: format!("toolChoice=force({name}) but the provider did not call it"),
        }),
        ToolChoice::None if !response.tool_requests.is_empty() => Err(LlmError::Protocol {
            message: "toolChoice=none but the provider emitted tool requests".to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_types::Platform;

    struct StubProvider {
        name: &'static str,
        available: bool,
        response: Result<ChatResponse, &'static str>,
    }

    fn stub_response(tool_requests: Vec<ToolRequest>) -> ChatResponse {
        ChatResponse {
            text: None,
            tool_requests,
            finish_reason: FinishReason::ToolUse,
            usage: Usage::default(),
            provider: "stub".to_string(),
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, LlmError> {
            match &self.response {
                Ok(response) => Ok(response.clone()),
                Err(message) => Err(LlmError::Provider { message: (*message).to_string() }),
            }
        }
    }

    fn base_request(tool_choice: ToolChoice) -> ChatRequest {
        ChatRequest {
            messages: vec![Message::System { text: "sys".to_string() }, Message::user("hi")],
            tools: vec![],
            tool_choice,
            temperature: None,
            max_tokens: None,
        }
    }

    #[tokio::test]
    async fn required_tool_choice_with_text_only_response_is_a_protocol_error() {
        let adapter = LlmAdapter::new(vec![Box::new(StubProvider {
            name: "primary",
            available: true,
            response: Ok(stub_response(vec![])),
        })]);
        let err = adapter.chat("s1", &base_request(ToolChoice::Required)).await.unwrap_err();
        assert!(matches!(err, LlmError::Protocol { .. }));
    }

    #[tokio::test]
    async fn unavailable_primary_is_skipped_in_favor_of_next_available() {
        let _ = Platform::Linux;
        let adapter = LlmAdapter::new(vec![
            Box::new(StubProvider { name: "offline", available: false, response: Ok(stub_response(vec![])) }),
            Box::new(StubProvider { name: "online", available: true, response: Ok(stub_response(vec![])) }),
        ]);
        let response = adapter.chat("s1", &base_request(ToolChoice::Auto)).await.unwrap();
        assert_eq!(response.provider, "stub");
    }

    #[tokio::test]
    async fn no_available_provider_is_reported() {
        let adapter = LlmAdapter::new(vec![Box::new(StubProvider {
            name: "offline",
            available: false,
            response: Ok(stub_response(vec![])),
        })]);
        let err = adapter.chat("s1", &base_request(ToolChoice::Auto)).await.unwrap_err();
        assert!(matches!(err, LlmError::NoProviderAvailable));
    }
}
