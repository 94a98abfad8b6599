//! Tool framework for relay
//!
//! Tools are the functions a unit can call. Failures are captured into
//! structured payloads instead of aborting the calling unit.

pub mod capture;
pub mod fn_tool;
pub mod registry;
pub mod tool;

pub use capture::{ToolOutcome, failure_payload, invoke_by_name, invoke_captured, is_failure};
pub use fn_tool::FnTool;
pub use registry::ToolRegistry;
pub use tool::Tool;
