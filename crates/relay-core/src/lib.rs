//! Core abstractions for relay
//!
//! This crate defines the worker unit contract, the per-run pipeline state,
//! execution events and the shared error type.

pub mod error;
pub mod event;
pub mod session;
pub mod state;
pub mod unit;

pub use error::{Error, Result};
pub use event::{EventEmitter, EventKind, EventPayload, ExecutionEvent};
pub use session::Turn;
pub use state::{Input, PipelineState, UnitInputs, is_empty_result};
pub use tokio_util::sync::CancellationToken;
pub use unit::{UnitContext, UnitSpec, UnitSpecBuilder, WorkerUnit};
