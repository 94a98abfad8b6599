//! Model backend trait definition

use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// Access to a language-model inference engine
///
/// Units only talk to the model through this trait, so any engine can be
/// plugged in: a hosted API, a local server or a scripted stand-in.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate one completion
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Backend name (e.g. "openai")
    fn name(&self) -> &str;

    /// Model used when a unit does not pick one
    fn default_model(&self) -> &str;
}
