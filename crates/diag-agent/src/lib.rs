#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Agentic loop: drives one user turn to completion over the LLM adapter,
//! tool registry, and conversation store, enforcing the diagnostic
//! protocol's forcing policy, stop conditions, and verification handoff.
//!
//! Ownership is unidirectional: the loop holds handles to the adapter and
//! registry (both immutable after startup) and the store; it owns no
//! global state of its own.

mod config;
mod error;

use std::sync::Arc;
use std::time::Instant;

use diag_llm::{ChatRequest, ChatResponse, LlmAdapter, LlmError, ToolChoice};
use diag_protocol::DiagnosticProtocol;
use diag_store::ConversationStore;
use diag_tools::{ToolExecution, ToolRegistry};
use diag_types::{LoopEvent, Message, Phase, ToolRequest, TurnStats};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use config::LoopConfig;
pub use error::AgentError;

/// Invoked after every tool execution, as `(sessionId, toolName, args,
/// resultSummary, durationMs, success)`.
pub type ToolCallHook = Arc<dyn Fn(&str, &str, &serde_json::Map<String, serde_json::Value>, &str, u64, bool) + Send + Sync>;

/// Outcome of running a bounded sequence of iterations, shared by the main
/// turn and the verification sub-loop.
struct IterationRun {
    final_text: String,
    stats: TurnStats,
}

enum RunOutcome {
    Completed(IterationRun),
    Cancelled,
}

/// Drives the agentic loop over a fixed set of collaborators.
pub struct AgentLoop {
    store: ConversationStore,
    tools: Arc<ToolRegistry>,
    llm: Arc<LlmAdapter>,
    protocol: DiagnosticProtocol,
    config: LoopConfig,
    on_tool_call: Option<ToolCallHook>,
}

impl AgentLoop {
    /// Builds a loop over the given collaborators and configuration.
    #[must_use]
    pub fn new(store: ConversationStore, tools: Arc<ToolRegistry>, llm: Arc<LlmAdapter>, protocol: DiagnosticProtocol, config: LoopConfig) -> Self {
        Self { store, tools, llm, protocol, config, on_tool_call: None }
    }

    /// Attaches a hook invoked after every tool execution.
    #[must_use]
    pub fn with_tool_call_hook(mut self, hook: ToolCallHook) -> Self {
        self.on_tool_call = Some(hook);
        self
    }

    /// Drives one user turn to completion, streaming [`LoopEvent`]s to
    /// `sink`. Returns once a terminal `Done`/`Error` event has been sent.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when the turn ends fatally: a store
    /// invariant violation, an LLM adapter failure surviving the forcing
    /// retry, or cancellation. In every case the corresponding `Error`
    /// event has already been sent to `sink`.
    pub async fn run_turn(&self, session_id: &str, user_text: &str, sink: mpsc::Sender<LoopEvent>, cancel: CancellationToken) -> Result<(), AgentError> {
        let handle = self.store.session(session_id, "");
        let is_first_user_turn = handle.lock().await.first_user_turn;

        if let Err(err) = self.store.append(session_id, Message::user(user_text)).await {
            let _ = sink.send(LoopEvent::Error { message: err.to_string() }).await;
            return Err(AgentError::from(err));
        }

        let has_tools = !self.tools.definitions().is_empty();
        let initial_choice = if self.config.force_tool_on_first_turn && is_first_user_turn && has_tools {
            ToolChoice::Required
        } else {
            ToolChoice::Auto
        };

        let outcome = self
            .run_iterations(session_id, initial_choice, self.config.max_iterations, Phase::Thinking, &sink, &cancel)
            .await;

        let mut run = match outcome {
            Ok(RunOutcome::Completed(run)) => run,
            Ok(RunOutcome::Cancelled) => {
                let _ = sink.send(LoopEvent::Error { message: "cancelled".to_string() }).await;
                return Err(AgentError::Cancelled);
            }
            Err(err) => {
                let _ = sink.send(LoopEvent::Error { message: err.to_string() }).await;
                return Err(err);
            }
        };

        let pending_verification = handle.lock().await.pending_verification;
        if pending_verification && self.config.verification_enabled {
            handle.lock().await.pending_verification = false;

            let verification_prompt = self.protocol.verification.prompt.to_string();
            if let Err(err) = self.store.append(session_id, Message::user(verification_prompt)).await {
                let _ = sink.send(LoopEvent::Error { message: err.to_string() }).await;
                return Err(AgentError::from(err));
            }

            let verification_outcome = self
                .run_iterations(session_id, ToolChoice::Auto, self.protocol.verification.max_iterations, Phase::Verifying, &sink, &cancel)
                .await;

            match verification_outcome {
                Ok(RunOutcome::Completed(verification_run)) => {
                    run.final_text = verification_run.final_text;
                    run.stats.iteration_count += verification_run.stats.iteration_count;
                    run.stats.tool_count += verification_run.stats.tool_count;
                    run.stats.tool_duration_ms += verification_run.stats.tool_duration_ms;
                    run.stats.verified = true;
                }
                Ok(RunOutcome::Cancelled) => {
                    let _ = sink.send(LoopEvent::Error { message: "cancelled".to_string() }).await;
                    return Err(AgentError::Cancelled);
                }
                Err(err) => {
                    let _ = sink.send(LoopEvent::Error { message: err.to_string() }).await;
                    return Err(err);
                }
            }
        }

        let _ = sink.send(LoopEvent::Done { final_text: run.final_text, stats: run.stats }).await;
        Ok(())
    }

    /// Runs up to `max_iterations` of the core algorithm (request, dispatch
    /// tools, feed results back) starting from `initial_choice`, stopping
    /// early once the assistant emits text with no tool requests. Shared
    /// by the main turn and the verification sub-loop, which differ only
    /// in their initial `toolChoice`, iteration cap, and reported phase.
    #[allow(clippy::too_many_lines)]
    async fn run_iterations(
        &self,
        session_id: &str,
        mut tool_choice: ToolChoice,
        max_iterations: u32,
        phase: Phase,
        sink: &mpsc::Sender<LoopEvent>,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, AgentError> {
        let turn_started = Instant::now();
        let mut stats = TurnStats::default();
        let tool_definitions = self.tools.definitions().to_vec();
        let mut final_text = String::new();
        let mut exhausted_with_pending_tools = false;
        let handle = self.store.session(session_id, "");

        for iteration in 1..=max_iterations {
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }
            stats.iteration_count = iteration;

            let elapsed_ms = u64::try_from(turn_started.elapsed().as_millis()).unwrap_or(u64::MAX);
            if elapsed_ms >= self.config.turn_soft_ceiling_ms {
                log::warn!("session {session_id} hit the turn soft ceiling at iteration {iteration}");
                exhausted_with_pending_tools = true;
                break;
            }

            let _ = sink
                .send(LoopEvent::Status {
                    phase,
                    iteration,
                    total: max_iterations,
                    message: status_message(phase, iteration),
                })
                .await;

            let messages = self.store.messages(session_id).await?;
            let request = ChatRequest {
                messages,
                tools: tool_definitions.clone(),
                tool_choice: tool_choice.clone(),
                temperature: None,
                max_tokens: None,
            };

            let response = match self.call_with_forcing_retry(session_id, &request, cancel).await {
                Ok(Some(response)) => response,
                Ok(None) => return Ok(RunOutcome::Cancelled),
                Err(err) => return Err(err),
            };

            let tool_requests = response.tool_requests.clone();
            self.store
                .append(
                    session_id,
                    Message::Assistant {
                        text: response.text.clone(),
                        tool_requests: if tool_requests.is_empty() { None } else { Some(tool_requests.clone()) },
                    },
                )
                .await?;

            if let Some(text) = response.text.as_ref().filter(|t| !t.is_empty()) {
                let _ = sink.send(LoopEvent::Content { text: text.clone() }).await;
            }

            if tool_requests.is_empty() {
                final_text = response.text.unwrap_or_default();
                exhausted_with_pending_tools = false;
                break;
            }
            exhausted_with_pending_tools = true;

            let dispatch = match self.dispatch_tool_requests(&tool_requests, sink, cancel).await {
                Ok(Some(dispatch)) => dispatch,
                Ok(None) => return Ok(RunOutcome::Cancelled),
                Err(err) => return Err(err),
            };

            for (request, execution) in tool_requests.iter().zip(dispatch.executions.iter()) {
                self.store
                    .append(
                        session_id,
                        Message::Tool {
                            call_id: request.call_id.clone(),
                            tool_name: request.name.clone(),
                            content: execution.result.content.clone(),
                            success: execution.result.success,
                        },
                    )
                    .await?;

                stats.tool_count += 1;
                stats.tool_duration_ms += execution.result.duration_ms;

                if execution.result.success && self.tools.is_action_tool(&request.name) {
                    handle.lock().await.pending_verification = true;
                }

                if let Some(hook) = &self.on_tool_call {
                    hook(
                        session_id,
                        &request.name,
                        &request.arguments,
                        &execution.result.content,
                        execution.result.duration_ms,
                        execution.result.success,
                    );
                }
            }

            tool_choice = if dispatch.stop_fired { ToolChoice::None } else { ToolChoice::Auto };
        }

        if exhausted_with_pending_tools {
            let messages = self.store.messages(session_id).await?;
            let summary_request = ChatRequest {
                messages,
                tools: tool_definitions,
                tool_choice: ToolChoice::None,
                temperature: None,
                max_tokens: None,
            };
            let response = match self.call_with_forcing_retry(session_id, &summary_request, cancel).await {
                Ok(Some(response)) => response,
                Ok(None) => return Ok(RunOutcome::Cancelled),
                Err(err) => return Err(err),
            };
            final_text = response.text.clone().unwrap_or_default();
            self.store
                .append(session_id, Message::Assistant { text: Some(final_text.clone()), tool_requests: None })
                .await?;
            stats.iteration_count += 1;
        }

        Ok(RunOutcome::Completed(IterationRun { final_text, stats }))
    }

    /// Sends one chat request, retrying once with `auto` if the forcing
    /// policy demanded a tool call and the provider returned text only.
    /// Returns `Ok(None)` on cancellation.
    async fn call_with_forcing_retry(
        &self,
        session_id: &str,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<Option<ChatResponse>, AgentError> {
        let result = tokio::select! {
            () = cancel.cancelled() => return Ok(None),
            result = self.llm.chat(session_id, request) => result,
        };

        match result {
            Ok(response) => Ok(Some(response)),
            Err(LlmError::Protocol { message }) if request.tool_choice == ToolChoice::Required => {
                log::warn!("session {session_id} required tool call but got none ({message}); retrying with auto");
                let retry_request = ChatRequest { tool_choice: ToolChoice::Auto, ..request.clone() };
                let retry = tokio::select! {
                    () = cancel.cancelled() => return Ok(None),
                    result = self.llm.chat(session_id, &retry_request) => result,
                };
                Ok(Some(retry.map_err(AgentError::from)?))
            }
            Err(err) => Err(AgentError::from(err)),
        }
    }

    /// Deduplicates tool requests by (name, arguments), dispatches the
    /// unique set with bounded concurrency, and maps results back onto
    /// every original request (including duplicates) in emission order.
    /// Returns `Ok(None)` on cancellation.
    async fn dispatch_tool_requests(
        &self,
        tool_requests: &[ToolRequest],
        sink: &mpsc::Sender<LoopEvent>,
        cancel: &CancellationToken,
    ) -> Result<Option<ToolDispatch>, AgentError> {
        let mut seen: Vec<String> = Vec::new();
        let mut owner_of: Vec<usize> = Vec::with_capacity(tool_requests.len());
        let mut unique_requests: Vec<&ToolRequest> = Vec::new();

        for request in tool_requests {
            let key = format!("{}:{}", request.name, serde_json::to_string(&request.arguments).unwrap_or_default());
            if let Some(position) = seen.iter().position(|k| k == &key) {
                owner_of.push(position);
            } else {
                seen.push(key);
                unique_requests.push(request);
                owner_of.push(unique_requests.len() - 1);
            }
        }

        for request in tool_requests {
            let _ = sink.send(LoopEvent::ToolCall { name: request.name.clone(), arguments: request.arguments.clone() }).await;
        }

        let fan_out = self.config.parallel_tool_fan_out.max(1);
        let mut unique_executions: Vec<ToolExecution> = Vec::with_capacity(unique_requests.len());

        for chunk in unique_requests.chunks(fan_out) {
            if cancel.is_cancelled() {
                return Ok(None);
            }
            let futures = chunk.iter().map(|request| self.tools.execute(request));
            let chunk_results = tokio::select! {
                () = cancel.cancelled() => return Ok(None),
                results = futures::future::join_all(futures) => results,
            };
            unique_executions.extend(chunk_results);
        }

        let mut stop_fired = false;
        for (request, execution) in unique_requests.iter().zip(unique_executions.iter()) {
            let _ = sink
                .send(LoopEvent::ToolResult {
                    tool: request.name.clone(),
                    success: execution.result.success,
                    content: execution.result.content.clone(),
                })
                .await;

            if let Some(probe_result) = &execution.probe_result
                && self.protocol.check_stop_condition(&request.name, probe_result).is_some()
            {
                stop_fired = true;
            }
        }

        let executions = owner_of.into_iter().map(|index| unique_executions[index].clone()).collect();
        Ok(Some(ToolDispatch { executions, stop_fired }))
    }
}

struct ToolDispatch {
    executions: Vec<ToolExecution>,
    stop_fired: bool,
}

fn status_message(phase: Phase, iteration: u32) -> String {
    match phase {
        Phase::Thinking if iteration == 1 => "Analyzing your request...".to_string(),
        Phase::Thinking => "Reviewing probe results...".to_string(),
        Phase::ExecutingTools => "Running diagnostic probes...".to_string(),
        Phase::Verifying => "Verifying the applied change...".to_string(),
        Phase::Summarizing => "Summarizing findings...".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_llm::{FinishReason, LlmProvider, Usage};
    use diag_probes::ProbeRuntime;
    use diag_types::ToolRequest;
    use serde_json::Map;
    use std::sync::Mutex as StdMutex;

    struct ScriptedProvider {
        responses: StdMutex<Vec<ChatResponse>>,
        requests: Arc<StdMutex<Vec<ChatRequest>>>,
    }

    #[async_trait::async_trait]
    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn is_available(&self) -> bool {
            true
        }

        async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
            self.requests.lock().unwrap().push(request.clone());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(LlmError::Provider { message: "script exhausted".to_string() });
            }
            Ok(responses.remove(0))
        }
    }

    fn text_response(text: &str) -> ChatResponse {
        ChatResponse {
            text: Some(text.to_string()),
            tool_requests: vec![],
            finish_reason: FinishReason::EndTurn,
            usage: Usage::default(),
            provider: "scripted".to_string(),
        }
    }

    fn tool_call_response(name: &str, call_id: &str) -> ChatResponse {
        ChatResponse {
            text: None,
            tool_requests: vec![ToolRequest { call_id: call_id.to_string(), name: name.to_string(), arguments: Map::new() }],
            finish_reason: FinishReason::ToolUse,
            usage: Usage::default(),
            provider: "scripted".to_string(),
        }
    }

    fn test_loop(responses: Vec<ChatResponse>) -> (AgentLoop, ConversationStore) {
        let (agent, store, _requests) = test_loop_with_requests(responses);
        (agent, store)
    }

    /// Like [`test_loop`], but also returns every [`ChatRequest`] the
    /// scripted provider received, in call order, so a test can assert on
    /// the forcing directive (`tool_choice`) the loop sent for a later
    /// iteration.
    fn test_loop_with_requests(responses: Vec<ChatResponse>) -> (AgentLoop, ConversationStore, Arc<StdMutex<Vec<ChatRequest>>>) {
        let store = ConversationStore::new();
        let tools = Arc::new(ToolRegistry::new(ProbeRuntime::new(diag_probes::DEFAULT_TIMEOUT)));
        let requests = Arc::new(StdMutex::new(Vec::new()));
        let llm = Arc::new(LlmAdapter::new(vec![Box::new(ScriptedProvider {
            responses: StdMutex::new(responses),
            requests: requests.clone(),
        })]));
        let agent = AgentLoop::new(store.clone(), tools, llm, DiagnosticProtocol::default(), LoopConfig::default());
        (agent, store, requests)
    }

    #[tokio::test]
    async fn text_only_response_completes_without_tool_dispatch() {
        let (agent, store) = test_loop(vec![text_response("the network is healthy")]);
        store.session("s1", "sys");
        let (tx, mut rx) = mpsc::channel(16);
        agent.run_turn("s1", "is my internet working", tx, CancellationToken::new()).await.unwrap();

        let mut saw_done = false;
        while let Some(event) = rx.recv().await {
            if let LoopEvent::Done { final_text, stats } = event {
                assert!(final_text.contains("healthy"));
                assert_eq!(stats.tool_count, 0);
                saw_done = true;
            }
        }
        assert!(saw_done);

        let messages = store.messages("s1").await.unwrap();
        assert_eq!(messages.len(), 3); // system, user, assistant
    }

    #[tokio::test]
    async fn disconnected_adapter_stops_probing_after_one_tool_call() {
        let (agent, store, requests) = test_loop_with_requests(vec![
            tool_call_response("check_adapter_status", "c1"),
            text_response("no network adapter is connected"),
        ]);
        store.session("s1", "sys");
        let (tx, mut rx) = mpsc::channel(32);
        agent.run_turn("s1", "my wifi is down", tx, CancellationToken::new()).await.unwrap();

        let mut tool_calls = 0;
        let mut saw_disconnected_result = false;
        while let Some(event) = rx.recv().await {
            match event {
                LoopEvent::ToolCall { .. } => tool_calls += 1,
                LoopEvent::ToolResult { tool, content, .. } if tool == "check_adapter_status" => {
                    saw_disconnected_result = content.contains("**connectedCount**: 0");
                }
                _ => {}
            }
        }
        assert_eq!(tool_calls, 1);

        // The stop condition only fires when check_adapter_status actually
        // reported connectedCount 0 on this host; assert the premise held,
        // then that it forced toolChoice to None on the next LLM call
        // rather than merely happening to end on text.
        assert!(saw_disconnected_result, "expected check_adapter_status to report a disconnected adapter in this sandbox");

        let recorded = requests.lock().unwrap();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].tool_choice, ToolChoice::None);
    }

    #[tokio::test]
    async fn action_tool_success_triggers_verification_sub_loop() {
        // cleanup_temp_files defaults to dryRun=true, so it succeeds
        // without depending on any platform-specific binary being present.
        let (agent, store) = test_loop(vec![
            tool_call_response("cleanup_temp_files", "c1"),
            text_response("temp files have been cleaned up"),
            tool_call_response("check_adapter_status", "v1"),
            text_response("verified: adapter is connected"),
        ]);
        store.session("s1", "sys");
        let (tx, mut rx) = mpsc::channel(32);
        agent.run_turn("s1", "clean up temp files", tx, CancellationToken::new()).await.unwrap();

        let mut done_stats = None;
        while let Some(event) = rx.recv().await {
            if let LoopEvent::Done { stats, .. } = event {
                done_stats = Some(stats);
            }
        }
        let stats = done_stats.unwrap();
        assert!(stats.verified);
        assert_eq!(stats.tool_count, 2);
    }

    #[tokio::test]
    async fn cancelled_turn_appends_no_assistant_message_and_emits_terminal_error() {
        let (agent, store) = test_loop(vec![text_response("should never be read")]);
        store.session("s1", "sys");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (tx, mut rx) = mpsc::channel(8);
        let result = agent.run_turn("s1", "hello", tx, cancel).await;
        assert!(matches!(result, Err(AgentError::Cancelled)));

        let mut saw_error = false;
        while let Some(event) = rx.recv().await {
            if let LoopEvent::Error { message } = event {
                assert_eq!(message, "cancelled");
                saw_error = true;
            }
        }
        assert!(saw_error);

        let messages = store.messages("s1").await.unwrap();
        assert_eq!(messages.len(), 2); // system, user only
    }
}
