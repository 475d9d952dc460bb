use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

/// A text-completion backend: prompt in, free text out.
///
/// The response is whatever the model produced — callers must parse it
/// defensively and never assume it conforms to the requested contract.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    /// Complete `prompt`, giving up after `timeout`.
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String>;

    fn name(&self) -> &str;
}
