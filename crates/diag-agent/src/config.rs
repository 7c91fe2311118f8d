/// Tunables for the agentic loop. Defaults match the documented
/// configuration surface; a facade layer may override them per deployment.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Upper bound on LLM round-trips for a single user turn.
    pub max_iterations: u32,
    /// Whether the first user turn of a session forces `toolChoice =
    /// required` when tools are available.
    pub force_tool_on_first_turn: bool,
    /// Maximum number of deduplicated tool requests dispatched
    /// concurrently within one iteration.
    pub parallel_tool_fan_out: usize,
    /// Soft wall-clock ceiling for a turn; once exceeded, the loop stops
    /// issuing further tool-forcing iterations and falls through to the
    /// forced summary call.
    pub turn_soft_ceiling_ms: u64,
    /// Whether a successful action-tool triggers the post-action
    /// verification sub-loop.
    pub verification_enabled: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 7,
            force_tool_on_first_turn: true,
            parallel_tool_fan_out: 4,
            turn_soft_ceiling_ms: 300_000,
            verification_enabled: true,
        }
    }
}
