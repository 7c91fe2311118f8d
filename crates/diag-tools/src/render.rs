//! Deterministic rendering of a [`ProbeResult`] into the model-facing
//! `content` string.

use diag_types::ProbeResult;
use serde_json::Value;

const MAX_VALUE_LEN: usize = 200;

fn render_value(value: &Value) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if rendered.len() > MAX_VALUE_LEN {
        format!("{}...", &rendered[..MAX_VALUE_LEN])
    } else {
        rendered
    }
}

/// Renders a probe result as `## <tool> Results` markdown, the shape both
/// humans and the model's own stop-condition checks can parse.
#[must_use]
pub fn render(tool_name: &str, result: &ProbeResult) -> String {
    let mut out = String::new();
    out.push_str(&format!("## {tool_name} Results\n"));
    out.push_str(&format!("**Status**: {}\n", if result.success { "Success" } else { "Failure" }));
    out.push_str(&format!("**Platform**: {}\n", result.platform));

    if let Some(error) = &result.error {
        out.push_str(&format!("**Error**: {error}\n"));
    }

    if !result.data.is_empty() {
        out.push_str("\n### Data\n");
        for (key, value) in &result.data {
            out.push_str(&format!("- **{key}**: {}\n", render_value(value)));
        }
    }

    if !result.suggestions.is_empty() {
        out.push_str("\n### Suggestions\n");
        for suggestion in &result.suggestions {
            out.push_str(&format!("- {suggestion}\n"));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use diag_types::Platform;

    #[test]
    fn renders_success_with_data_lines() {
        let mut data = serde_json::Map::new();
        data.insert("reachable".to_string(), Value::Bool(true));
        let result = ProbeResult::success(data, Platform::Linux);
        let rendered = render("ping_gateway", &result);
        assert!(rendered.starts_with("## ping_gateway Results\n"));
        assert!(rendered.contains("**Status**: Success"));
        assert!(rendered.contains("- **reachable**: true"));
    }

    #[test]
    fn renders_failure_with_error_line() {
        let result = ProbeResult::failure("timeout", Platform::Windows);
        let rendered = render("ping_dns", &result);
        assert!(rendered.contains("**Status**: Failure"));
        assert!(rendered.contains("**Error**: timeout"));
    }

    #[test]
    fn truncates_long_values() {
        let mut data = serde_json::Map::new();
        data.insert("raw".to_string(), Value::String("x".repeat(500)));
        let result = ProbeResult::success(data, Platform::Linux);
        let rendered = render("get_ip_config", &result);
        let data_line = rendered.lines().find(|l| l.starts_with("- **raw**")).unwrap();
        assert!(data_line.len() < 500);
        assert!(data_line.ends_with("..."));
    }
}
