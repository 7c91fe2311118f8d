#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared data model for the diagnostic agent's agentic loop.
//!
//! Defines the conversation message model, tool request/result/definition
//! types, the probe result shape, and the streamed loop event variants.
//! Everything here is plain data, no I/O, no provider-specific wire
//! formats. The LLM adapter, tool registry, and probe runtime each convert
//! their own external shapes to and from these types at the boundary.

mod event;
mod message;
mod platform;
mod probe;
mod tool;

pub use event::{LoopEvent, Phase, TurnStats};
pub use message::{Message, ToolRequest, ToolResult};
pub use platform::Platform;
pub use probe::ProbeResult;
pub use tool::{ParameterType, ToolDefinition, ToolParameter};
