//! Worker unit runtime for relay
//!
//! This crate provides the model/tool executor, the concrete worker units and
//! a UnitRuntime that builds them from shared dependencies.

pub mod executor;
pub mod prompt;
pub mod runtime;
pub mod units;

pub use executor::{ExecutorConfig, UnitExecutor};
pub use runtime::{UnitRuntime, UnitRuntimeBuilder};
pub use units::{ArgumentSource, FnUnit, LlmUnit, ToolCallUnit};
