//! Model backend boundary for relay
//!
//! This crate provides the provider-agnostic types units use to talk to a
//! language model:
//!
//! - Message types, including tool use and tool results
//! - Completion request/response types
//! - Tool definitions for function calling
//! - The [`ModelBackend`] trait and concrete backends

pub mod backend;
pub mod completion;
pub mod error;
pub mod messages;
pub mod providers;
pub mod tools;

pub use backend::ModelBackend;
pub use completion::{CompletionRequest, CompletionRequestBuilder, CompletionResponse, StopReason, TokenUsage};
pub use error::{LlmError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use tools::ToolDefinition;
