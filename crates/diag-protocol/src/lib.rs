#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Diagnostic protocol rules: the OSI-ladder stop-condition table and the
//! post-action verification policy, consulted by the agentic loop.
//!
//! Modeled as data rather than code so the loop stays generic: a test (or
//! a future tool suite) can substitute its own [`DiagnosticProtocol`]
//! without touching the loop itself.

use diag_types::ProbeResult;

/// A field value an incoming probe result is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCondition {
    /// The named boolean field must equal this value.
    BoolEquals(bool),
    /// The named integer field must equal this value.
    IntEquals(i64),
}

impl FieldCondition {
    fn matches(self, result: &ProbeResult, field: &str) -> bool {
        match self {
            Self::BoolEquals(expected) => result.data_bool(field) == Some(expected),
            Self::IntEquals(expected) => result.data_i64(field) == Some(expected),
        }
    }
}

/// One row of the stop-condition table: "if `tool`'s result has `field`
/// satisfying `condition`, stop probing" (force `toolChoice = none` on the
/// next iteration rather than halting the loop outright).
#[derive(Debug, Clone)]
pub struct StopRule {
    /// Tool this rule watches.
    pub tool: &'static str,
    /// Field within the probe result's data map.
    pub field: &'static str,
    /// Condition the field must satisfy to fire.
    pub condition: FieldCondition,
    /// Short human-readable description, used in logs.
    pub description: &'static str,
}

/// The verification sub-loop's configuration: which tools to run, in what
/// order, via which synthetic user message, and how many iterations it may
/// take.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    /// Synthetic user message injected to kick off the sub-loop.
    pub prompt: &'static str,
    /// Tools the sub-loop is expected to run, in order, for documentation
    /// and testing purposes. The loop itself still lets the model decide
    /// which tools to call; this is the intended sequence.
    pub expected_tools: &'static [&'static str],
    /// Maximum iterations for the sub-loop.
    pub max_iterations: u32,
}

/// The full set of protocol rules consulted by the agentic loop: which
/// tools are state-changing ("action tools", triggering verification),
/// the stop-condition table, and the verification policy.
#[derive(Debug, Clone)]
pub struct DiagnosticProtocol {
    /// Tools whose success sets `pendingVerification = true`.
    pub action_tools: &'static [&'static str],
    /// The OSI-ladder stop-condition table.
    pub stop_rules: Vec<StopRule>,
    /// The post-action verification policy.
    pub verification: VerificationPolicy,
}

impl DiagnosticProtocol {
    /// Returns `true` if `tool` mutates host state and should trigger the
    /// verification sub-loop on success.
    #[must_use]
    pub fn is_action_tool(&self, tool: &str) -> bool {
        self.action_tools.contains(&tool)
    }

    /// Evaluates the stop-condition table against one tool's result.
    ///
    /// Returns the matching rule's description if any rule fired, so the
    /// loop can log why it is forcing `toolChoice = none`.
    #[must_use]
    pub fn check_stop_condition(&self, tool: &str, result: &ProbeResult) -> Option<&str> {
        self.stop_rules
            .iter()
            .find(|rule| rule.tool == tool && rule.condition.matches(result, rule.field))
            .map(|rule| rule.description)
    }
}

impl Default for DiagnosticProtocol {
    /// The canonical OSI-ladder protocol: adapter -> IP config -> gateway
    /// reachability -> external reachability -> DNS resolution, with the
    /// network action tools gating verification.
    fn default() -> Self {
        Self {
            action_tools: &[
                "enable_wifi",
                "fix_dell_audio",
                "repair_office365",
                "run_dism_sfc",
                "cleanup_temp_files",
                "kill_process",
            ],
            stop_rules: vec![
                StopRule {
                    tool: "check_adapter_status",
                    field: "connectedCount",
                    condition: FieldCondition::IntEquals(0),
                    description: "no network adapter is connected",
                },
                StopRule {
                    tool: "get_ip_config",
                    field: "hasValidIp",
                    condition: FieldCondition::BoolEquals(false),
                    description: "no valid IP configuration",
                },
                StopRule {
                    tool: "get_ip_config",
                    field: "isApipa",
                    condition: FieldCondition::BoolEquals(true),
                    description: "DHCP failed, address is APIPA",
                },
                StopRule {
                    tool: "ping_gateway",
                    field: "reachable",
                    condition: FieldCondition::BoolEquals(false),
                    description: "default gateway is unreachable",
                },
                StopRule {
                    tool: "ping_dns",
                    field: "internetAccessible",
                    condition: FieldCondition::BoolEquals(false),
                    description: "no external internet reachability",
                },
                StopRule {
                    tool: "test_dns_resolution",
                    field: "dnsWorking",
                    condition: FieldCondition::BoolEquals(false),
                    description: "DNS resolution is failing (final OSI layer)",
                },
            ],
            verification: VerificationPolicy {
                prompt: "A state-changing action was applied; verify with \
                         check_adapter_status then ping_dns.",
                expected_tools: &["check_adapter_status", "ping_dns"],
                max_iterations: 3,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_types::Platform;

    fn result_with(field: &str, value: serde_json::Value) -> ProbeResult {
        let mut data = serde_json::Map::new();
        data.insert(field.to_string(), value);
        ProbeResult::success(data, Platform::Linux)
    }

    #[test]
    fn disconnected_adapter_fires_stop_condition() {
        let protocol = DiagnosticProtocol::default();
        let result = result_with("connectedCount", serde_json::json!(0));
        assert!(
            protocol
                .check_stop_condition("check_adapter_status", &result)
                .is_some()
        );
    }

    #[test]
    fn connected_adapter_does_not_fire() {
        let protocol = DiagnosticProtocol::default();
        let result = result_with("connectedCount", serde_json::json!(1));
        assert!(
            protocol
                .check_stop_condition("check_adapter_status", &result)
                .is_none()
        );
    }

    #[test]
    fn unrelated_tool_never_fires() {
        let protocol = DiagnosticProtocol::default();
        let result = result_with("connectedCount", serde_json::json!(0));
        assert!(
            protocol
                .check_stop_condition("list_cities", &result)
                .is_none()
        );
    }

    #[test]
    fn action_tools_match_spec_action_set() {
        let protocol = DiagnosticProtocol::default();
        assert!(protocol.is_action_tool("enable_wifi"));
        assert!(protocol.is_action_tool("kill_process"));
        assert!(!protocol.is_action_tool("ping_gateway"));
    }

    #[test]
    fn verification_policy_names_check_then_ping() {
        let protocol = DiagnosticProtocol::default();
        assert_eq!(
            protocol.verification.expected_tools,
            &["check_adapter_status", "ping_dns"]
        );
        assert_eq!(protocol.verification.max_iterations, 3);
    }
}
