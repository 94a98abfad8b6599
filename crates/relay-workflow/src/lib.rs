//! Sequential pipelines for relay
//!
//! A [`SequentialPipeline`] runs worker units in order over a shared
//! [`PipelineState`](relay_core::PipelineState). Every run yields a
//! [`PipelineRun`] carrying the final state, the status and the ordered
//! event trace.

pub mod flow;
pub mod nested;
pub mod pipeline;
pub mod run;

pub use flow::{FlowEdge, FlowGraph, FlowNode};
pub use nested::PipelineUnit;
pub use pipeline::{PipelineBuilder, SequentialPipeline};
pub use run::{EventTap, PipelineRun, RunOptions, RunStatus, StageFailure};
