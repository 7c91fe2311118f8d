use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Platform;

/// The outcome of running a single probe, internal to the probe runtime.
///
/// The tool registry renders this into the model-facing `content` string
/// via a deterministic template; it never introspects probe-specific
/// result types.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    /// Whether the probe's parser judged the command successful.
    pub success: bool,
    /// Structured key/value data extracted from the command output.
    pub data: serde_json::Map<String, Value>,
    /// Raw captured output, kept for debugging/auditing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_output: Option<String>,
    /// Error detail when `success` is `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-text remediation suggestions surfaced to the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    /// Platform the probe ran on.
    pub platform: Platform,
}

impl ProbeResult {
    /// Builds a successful result with the given structured data.
    #[must_use]
    pub fn success(data: serde_json::Map<String, Value>, platform: Platform) -> Self {
        Self {
            success: true,
            data,
            raw_output: None,
            error: None,
            suggestions: Vec::new(),
            platform,
        }
    }

    /// Builds a failed result with the given error message.
    #[must_use]
    pub fn failure(error: impl Into<String>, platform: Platform) -> Self {
        Self {
            success: false,
            data: serde_json::Map::new(),
            raw_output: None,
            error: Some(error.into()),
            suggestions: Vec::new(),
            platform,
        }
    }

    /// Attaches raw captured output.
    #[must_use]
    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }

    /// Attaches remediation suggestions.
    #[must_use]
    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    /// Looks up a boolean field in `data`, used by the protocol rules'
    /// stop-condition checks.
    #[must_use]
    pub fn data_bool(&self, key: &str) -> Option<bool> {
        self.data.get(key).and_then(Value::as_bool)
    }

    /// Looks up an integer field in `data`.
    #[must_use]
    pub fn data_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(Value::as_i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_bool_reads_back_inserted_field() {
        let mut data = serde_json::Map::new();
        data.insert("reachable".to_string(), Value::Bool(false));
        let result = ProbeResult::success(data, Platform::Linux);
        assert_eq!(result.data_bool("reachable"), Some(false));
        assert_eq!(result.data_bool("missing"), None);
    }

    #[test]
    fn failure_carries_error_and_no_data() {
        let result = ProbeResult::failure("timeout", Platform::MacOs);
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timeout"));
        assert!(result.data.is_empty());
    }
}
