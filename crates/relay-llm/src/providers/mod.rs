//! Model backend implementations

pub mod openai;
pub mod scripted;

pub use openai::{OpenAiBackend, OpenAiConfig};
pub use scripted::ScriptedBackend;
