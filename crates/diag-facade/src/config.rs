/// The recognized configuration surface (§6), read once at facade
/// construction. Every field has a documented default; `from_env` lets a
/// deployment override individual values via `DIAG_*` environment
/// variables without touching code.
#[derive(Debug, Clone)]
pub struct DiagnosticConfig {
    /// Upper bound on LLM round-trips for a single user turn.
    pub max_tool_iterations: u32,
    /// Whether the first user turn forces `toolChoice = required`.
    pub force_tool_on_first_turn: bool,
    /// Maximum deduplicated tool requests dispatched concurrently.
    pub parallel_tool_fan_out: usize,
    /// Default per-probe wall-clock timeout, in milliseconds.
    pub probe_default_timeout_ms: u64,
    /// Per-LLM-request timeout, in milliseconds.
    pub llm_request_timeout_ms: u64,
    /// Soft wall-clock ceiling for a turn, in milliseconds.
    pub turn_soft_ceiling_ms: u64,
    /// Provider names, in the order they should be tried.
    pub provider_priority: Vec<String>,
    /// Path to a file holding the system prompt, if overridden.
    pub system_prompt_path: Option<String>,
    /// Whether a successful action tool triggers the verification
    /// sub-loop.
    pub verification_enabled: bool,
    /// Minimum age, in seconds, a temp file must reach before
    /// `cleanup_temp_files` will remove it.
    pub temp_file_min_age_seconds: u64,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: 7,
            force_tool_on_first_turn: true,
            parallel_tool_fan_out: 4,
            probe_default_timeout_ms: 15_000,
            llm_request_timeout_ms: 120_000,
            turn_soft_ceiling_ms: 300_000,
            provider_priority: vec!["anthropic".to_string(), "openai".to_string(), "local".to_string()],
            system_prompt_path: None,
            verification_enabled: true,
            temp_file_min_age_seconds: 3_600,
        }
    }
}

impl DiagnosticConfig {
    /// Builds a config from defaults, overridden by any `DIAG_*`
    /// environment variables that are set and parse successfully.
    /// Unset or unparseable variables silently fall back to the default.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_tool_iterations: env_u32("DIAG_MAX_TOOL_ITERATIONS", defaults.max_tool_iterations),
            force_tool_on_first_turn: env_bool("DIAG_FORCE_TOOL_ON_FIRST_TURN", defaults.force_tool_on_first_turn),
            parallel_tool_fan_out: env_usize("DIAG_PARALLEL_TOOL_FAN_OUT", defaults.parallel_tool_fan_out),
            probe_default_timeout_ms: env_u64("DIAG_PROBE_DEFAULT_TIMEOUT_MS", defaults.probe_default_timeout_ms),
            llm_request_timeout_ms: env_u64("DIAG_LLM_REQUEST_TIMEOUT_MS", defaults.llm_request_timeout_ms),
            turn_soft_ceiling_ms: env_u64("DIAG_TURN_SOFT_CEILING_MS", defaults.turn_soft_ceiling_ms),
            provider_priority: std::env::var("DIAG_PROVIDER_PRIORITY")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
                .unwrap_or(defaults.provider_priority),
            system_prompt_path: std::env::var("DIAG_SYSTEM_PROMPT_PATH").ok().or(defaults.system_prompt_path),
            verification_enabled: env_bool("DIAG_VERIFICATION_ENABLED", defaults.verification_enabled),
            temp_file_min_age_seconds: env_u64("DIAG_TEMP_FILE_MIN_AGE_SECONDS", defaults.temp_file_min_age_seconds),
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_configuration_surface() {
        let config = DiagnosticConfig::default();
        assert_eq!(config.max_tool_iterations, 7);
        assert!(config.force_tool_on_first_turn);
        assert_eq!(config.parallel_tool_fan_out, 4);
        assert_eq!(config.probe_default_timeout_ms, 15_000);
        assert_eq!(config.llm_request_timeout_ms, 120_000);
        assert_eq!(config.turn_soft_ceiling_ms, 300_000);
        assert!(config.verification_enabled);
        assert_eq!(config.temp_file_min_age_seconds, 3_600);
    }

    #[test]
    fn from_env_falls_back_to_defaults_when_unset() {
        std::env::remove_var("DIAG_MAX_TOOL_ITERATIONS");
        let config = DiagnosticConfig::from_env();
        assert_eq!(config.max_tool_iterations, 7);
    }
}
