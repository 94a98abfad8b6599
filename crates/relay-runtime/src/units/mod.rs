//! Concrete unit implementations
//!
//! - LlmUnit: instruction-driven model loop with tools
//! - ToolCallUnit: one deterministic tool call
//! - FnUnit: closure-backed deterministic step

pub mod function;
pub mod llm;
pub mod tool_call;

pub use function::FnUnit;
pub use llm::LlmUnit;
pub use tool_call::{ArgumentSource, ToolCallUnit};
