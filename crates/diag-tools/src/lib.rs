#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Tool registry: the authoritative set of tools exposed to the model,
//! backed by the probe runtime.
//!
//! Owns schemas (for the model) and dispatch (for the loop). Never
//! introspects a [`diag_types::ProbeResult`] beyond the deterministic
//! rendering template; the loop's stop-condition checks read the
//! underlying `ProbeResult` directly rather than parsing rendered text.

mod definitions;
mod error;
mod render;
mod validate;

use std::time::Instant;

use diag_probes::{ProbeContext, ProbeError, ProbeRuntime};
use diag_types::{ProbeResult, ToolDefinition, ToolRequest, ToolResult};

pub use error::ToolError;

/// The outcome of dispatching a single tool request: the rendered,
/// model-facing [`ToolResult`] alongside the raw [`ProbeResult`] the loop
/// needs for stop-condition checks. `probe_result` is `None` when dispatch
/// never reached a probe (unknown tool, failed validation).
#[derive(Clone)]
pub struct ToolExecution {
    pub result: ToolResult,
    pub probe_result: Option<ProbeResult>,
}

/// Owns the tool catalog and dispatches requests to the probe runtime.
pub struct ToolRegistry {
    definitions: Vec<ToolDefinition>,
    runtime: ProbeRuntime,
}

impl ToolRegistry {
    /// Builds a registry with the full built-in tool catalog registered
    /// over the given probe runtime.
    #[must_use]
    pub fn new(runtime: ProbeRuntime) -> Self {
        let mut registry = Self {
            definitions: Vec::new(),
            runtime,
        };
        for definition in definitions::builtin_tool_definitions() {
            registry
                .register(definition)
                .expect("built-in tool names must be unique");
        }
        registry
    }

    /// Adds a tool definition, preserving registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::DuplicateName`] if a tool with this name is
    /// already registered.
    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), ToolError> {
        if self.definitions.iter().any(|d| d.name == definition.name) {
            return Err(ToolError::DuplicateName { name: definition.name });
        }
        self.definitions.push(definition);
        Ok(())
    }

    /// The tool catalog in registration order, for presentation to the
    /// model.
    #[must_use]
    pub fn definitions(&self) -> &[ToolDefinition] {
        &self.definitions
    }

    /// Returns `true` if `name` names a registered tool belonging to the
    /// state-changing action set, rather than a read-only probe.
    #[must_use]
    pub fn is_action_tool(&self, name: &str) -> bool {
        diag_protocol::DiagnosticProtocol::default().is_action_tool(name)
    }

    /// Executes a tool request and renders the outcome. Never returns an
    /// `Err`: an unknown name, failed validation, or probe dispatch error
    /// all produce an error-shaped [`ToolResult`] instead.
    pub async fn execute(&self, request: &ToolRequest) -> ToolExecution {
        let start = Instant::now();

        let Some(definition) = self.definitions.iter().find(|d| d.name == request.name) else {
            return self.error_result(request, start, format!("unknown tool '{}'", request.name));
        };

        let mut arguments = request.arguments.clone();
        if let Err(message) = validate::validate_and_coerce(definition, &mut arguments) {
            return self.error_result(request, start, message);
        }

        match self.runtime.run(&request.name, &arguments, &ProbeContext::default()).await {
            Ok(probe_result) => {
                let content = render::render(&request.name, &probe_result);
                let result = ToolResult {
                    call_id: request.call_id.clone(),
                    name: request.name.clone(),
                    content,
                    success: probe_result.success,
                    duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    error: probe_result.error.clone(),
                };
                ToolExecution {
                    result,
                    probe_result: Some(probe_result),
                }
            }
            Err(ProbeError::NotFound { name }) => self.error_result(request, start, format!("unknown tool '{name}'")),
            Err(err @ ProbeError::UnsupportedPlatform { .. }) => self.error_result(request, start, err.to_string()),
            Err(err) => self.error_result(request, start, err.to_string()),
        }
    }

    fn error_result(&self, request: &ToolRequest, start: Instant, message: String) -> ToolExecution {
        log::warn!("tool '{}' dispatch failed: {message}", request.name);
        let result = ToolResult {
            call_id: request.call_id.clone(),
            name: request.name.clone(),
            content: format!("## {} Results\n**Status**: Failure\n**Error**: {message}\n", request.name),
            success: false,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            error: Some(message),
        };
        ToolExecution { result, probe_result: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn registry() -> ToolRegistry {
        ToolRegistry::new(ProbeRuntime::new(diag_probes::DEFAULT_TIMEOUT))
    }

    #[test]
    fn builtin_catalog_has_no_duplicate_names() {
        let registry = registry();
        let mut names: Vec<_> = registry.definitions().iter().map(|d| d.name.clone()).collect();
        let before = names.len();
        names.sort();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[tokio::test]
    async fn unknown_tool_name_yields_error_shaped_result() {
        let registry = registry();
        let request = ToolRequest {
            call_id: "c1".to_string(),
            name: "does_not_exist".to_string(),
            arguments: Map::new(),
        };
        let execution = registry.execute(&request).await;
        assert!(!execution.result.success);
        assert!(execution.result.error.is_some());
        assert_eq!(execution.result.call_id, "c1");
        assert!(execution.probe_result.is_none());
    }

    #[tokio::test]
    async fn missing_required_argument_yields_error_shaped_result() {
        let registry = registry();
        let request = ToolRequest {
            call_id: "c2".to_string(),
            name: "kill_process".to_string(),
            arguments: Map::new(),
        };
        let execution = registry.execute(&request).await;
        assert!(!execution.result.success);
        assert!(execution.result.error.as_deref().unwrap().contains("processName"));
    }

    #[tokio::test]
    async fn known_read_only_probe_dispatches_successfully() {
        let registry = registry();
        let request = ToolRequest {
            call_id: "c3".to_string(),
            name: "check_adapter_status".to_string(),
            arguments: Map::new(),
        };
        let execution = registry.execute(&request).await;
        assert_eq!(execution.result.name, "check_adapter_status");
        assert!(execution.result.content.starts_with("## check_adapter_status Results"));
        assert!(execution.probe_result.is_some());
    }
}
