#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Session facade: the public, in-process entry point for the diagnostic
//! agent. Owns session lifecycle, the configuration surface, and the
//! local-model sidecar process, and wires the conversation store, tool
//! registry, LLM adapter, and agentic loop together.

mod config;
mod error;
mod sidecar;

use std::sync::Arc;
use std::time::Duration;

use dashmap::{DashMap, DashSet};
use diag_agent::{AgentLoop, LoopConfig, ToolCallHook};
use diag_llm::{AnthropicProvider, LlmAdapter, LlmCallHook, LlmProvider, LocalProvider, OpenAiProvider};
use diag_probes::ProbeRuntime;
use diag_protocol::DiagnosticProtocol;
use diag_store::{ConversationStore, MessageHook, SessionSummary};
use diag_tools::ToolRegistry;
use diag_types::{LoopEvent, Message};
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub use config::DiagnosticConfig;
pub use error::FacadeError;
pub use sidecar::{LocalSidecar, SidecarCommand};

const DEFAULT_SYSTEM_PROMPT: &str = "You are a network and system diagnostic assistant. Use the available tools to investigate the user's problem, starting from read-only probes before proposing or taking any state-changing action. Narrate what you find in plain language.";

const DEFAULT_LOCAL_BASE_URL: &str = "http://localhost:11434";

/// Owns every collaborator for one running agent deployment: the
/// conversation store, tool registry, LLM adapter, agentic loop, and
/// (optionally) a local-model sidecar process.
pub struct SessionFacade {
    store: ConversationStore,
    agent: Arc<AgentLoop>,
    sidecar: Arc<LocalSidecar>,
    known_sessions: DashSet<String>,
    send_locks: DashMap<String, Arc<Mutex<()>>>,
    system_prompt: String,
}

impl SessionFacade {
    /// Builds a facade from `config`, with no persistence/analytics hooks
    /// attached. Providers are constructed from environment variables
    /// following `config.provider_priority`.
    #[must_use]
    pub fn new(config: DiagnosticConfig) -> Self {
        Self::with_hooks(config, None, None, None)
    }

    /// Builds a facade from `config`, attaching the given collaborator
    /// hooks (§6 persistence collaborator contract) at construction time.
    #[must_use]
    pub fn with_hooks(
        config: DiagnosticConfig,
        message_hook: Option<MessageHook>,
        tool_call_hook: Option<ToolCallHook>,
        llm_call_hook: Option<LlmCallHook>,
    ) -> Self {
        let probe_default_timeout = Duration::from_millis(config.probe_default_timeout_ms);
        let probe_runtime = ProbeRuntime::with_temp_file_min_age(probe_default_timeout, config.temp_file_min_age_seconds);
        let tools = Arc::new(ToolRegistry::new(probe_runtime));

        let local_base_url = std::env::var("AI_BASE_URL").unwrap_or_else(|_| DEFAULT_LOCAL_BASE_URL.to_string());
        let providers = build_providers_from_env(&config, &local_base_url);

        let mut llm = LlmAdapter::new(providers);
        if let Some(hook) = llm_call_hook {
            llm = llm.with_llm_call_hook(hook);
        }

        let mut store = ConversationStore::new();
        if let Some(hook) = message_hook {
            store = store.with_message_hook(hook);
        }

        let loop_config = LoopConfig {
            max_iterations: config.max_tool_iterations,
            force_tool_on_first_turn: config.force_tool_on_first_turn,
            parallel_tool_fan_out: config.parallel_tool_fan_out,
            turn_soft_ceiling_ms: config.turn_soft_ceiling_ms,
            verification_enabled: config.verification_enabled,
        };

        let mut agent = AgentLoop::new(store.clone(), tools, Arc::new(llm), DiagnosticProtocol::default(), loop_config);
        if let Some(hook) = tool_call_hook {
            agent = agent.with_tool_call_hook(hook);
        }

        let system_prompt = config
            .system_prompt_path
            .as_ref()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string());

        let sidecar = LocalSidecar::new(SidecarCommand::from_env(), local_base_url);

        Self {
            store,
            agent: Arc::new(agent),
            sidecar: Arc::new(sidecar),
            known_sessions: DashSet::new(),
            send_locks: DashMap::new(),
            system_prompt,
        }
    }

    /// Creates a new session, seeded with the configured system prompt,
    /// and returns its ID.
    #[must_use]
    pub fn start_session(&self) -> String {
        let session_id = uuid::Uuid::new_v4().to_string();
        self.store.session(&session_id, &self.system_prompt);
        self.known_sessions.insert(session_id.clone());
        session_id
    }

    /// Drives one user turn to completion, streaming [`LoopEvent`]s to
    /// `sink`. Starts the local-model sidecar on first use if one is
    /// configured. At most one `send_message` call runs per session at a
    /// time; concurrent calls against the same session queue behind each
    /// other, while different sessions proceed independently.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::UnknownSession`] if `session_id` was never
    /// returned by [`Self::start_session`], [`FacadeError::Sidecar`] if a
    /// configured local-model sidecar fails to start, or the underlying
    /// [`FacadeError::Agent`] error if the turn itself ends fatally.
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        sink: mpsc::Sender<LoopEvent>,
        cancel: CancellationToken,
    ) -> Result<(), FacadeError> {
        if !self.known_sessions.contains(session_id) {
            return Err(FacadeError::UnknownSession { session_id: session_id.to_string() });
        }

        let lock = self.send_locks.entry(session_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
        let _guard = lock.lock().await;

        self.sidecar.ensure_started().await.map_err(|message| FacadeError::Sidecar { message })?;

        self.agent.run_turn(session_id, text, sink, cancel).await.map_err(FacadeError::from)
    }

    /// Lists every known session, most useful for a development harness
    /// or an operator dashboard.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.store.list_summaries().await
    }

    /// Returns the full message history for a session.
    ///
    /// # Errors
    ///
    /// Returns [`FacadeError::UnknownSession`] if `session_id` was never
    /// returned by [`Self::start_session`].
    pub async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, FacadeError> {
        if !self.known_sessions.contains(session_id) {
            return Err(FacadeError::UnknownSession { session_id: session_id.to_string() });
        }
        Ok(self.store.messages(session_id).await?)
    }

    /// Removes a session's in-memory state. A no-op if the session does
    /// not exist.
    pub fn delete_session(&self, session_id: &str) {
        self.store.delete(session_id);
        self.known_sessions.remove(session_id);
        self.send_locks.remove(session_id);
    }

    /// Terminates the local-model sidecar, if one was started. Call this
    /// once, on process shutdown.
    pub async fn shutdown(&self) {
        self.sidecar.shutdown().await;
    }
}

/// Builds the provider list from `config.provider_priority`, skipping any
/// entry whose required credentials are not present in the environment.
/// Unrecognized names are skipped with a warning.
fn build_providers_from_env(config: &DiagnosticConfig, local_base_url: &str) -> Vec<Box<dyn LlmProvider>> {
    let mut providers: Vec<Box<dyn LlmProvider>> = Vec::new();
    let request_timeout = Duration::from_millis(config.llm_request_timeout_ms);

    for name in &config.provider_priority {
        match name.as_str() {
            "anthropic" | "claude" => match std::env::var("ANTHROPIC_API_KEY") {
                Ok(api_key) => {
                    let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());
                    providers.push(Box::new(AnthropicProvider::new(api_key, model, request_timeout)));
                }
                Err(_) => log::info!("skipping anthropic provider: ANTHROPIC_API_KEY not set"),
            },
            "openai" | "gpt" => match std::env::var("OPENAI_API_KEY") {
                Ok(api_key) => {
                    let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
                    providers.push(Box::new(OpenAiProvider::new(api_key, model, request_timeout)));
                }
                Err(_) => log::info!("skipping openai provider: OPENAI_API_KEY not set"),
            },
            "local" => {
                let model = std::env::var("AI_MODEL").unwrap_or_else(|_| "local-model".to_string());
                providers.push(Box::new(LocalProvider::new(local_base_url.to_string(), model, request_timeout)));
            }
            other => log::warn!("unrecognized provider name in providerPriority: {other}"),
        }
    }

    providers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_session_seeds_the_system_prompt() {
        let facade = SessionFacade::new(DiagnosticConfig::default());
        let session_id = facade.start_session();
        let messages = facade.get_messages(&session_id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_system());
    }

    #[tokio::test]
    async fn send_message_against_an_unknown_session_is_rejected() {
        let facade = SessionFacade::new(DiagnosticConfig::default());
        let (tx, _rx) = mpsc::channel(4);
        let err = facade.send_message("ghost", "hi", tx, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, FacadeError::UnknownSession { .. }));
    }

    #[tokio::test]
    async fn get_messages_against_an_unknown_session_is_rejected() {
        let facade = SessionFacade::new(DiagnosticConfig::default());
        let err = facade.get_messages("ghost").await.unwrap_err();
        assert!(matches!(err, FacadeError::UnknownSession { .. }));
    }

    #[tokio::test]
    async fn delete_session_removes_it_from_the_known_set() {
        let facade = SessionFacade::new(DiagnosticConfig::default());
        let session_id = facade.start_session();
        facade.delete_session(&session_id);
        assert!(matches!(facade.get_messages(&session_id).await, Err(FacadeError::UnknownSession { .. })));
    }

    #[tokio::test]
    async fn list_sessions_reflects_started_sessions() {
        let facade = SessionFacade::new(DiagnosticConfig::default());
        facade.start_session();
        facade.start_session();
        assert_eq!(facade.list_sessions().await.len(), 2);
    }
}
