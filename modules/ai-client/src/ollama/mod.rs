mod client;
pub(crate) mod types;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::traits::CompletionModel;
use client::OllamaClient;
use types::GenerateRequest;

/// Completion backend speaking the Ollama generate API.
pub struct Ollama {
    client: OllamaClient,
    model: String,
}

impl Ollama {
    pub fn new(host: &str, model: &str) -> Self {
        Self {
            client: OllamaClient::new(host),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl CompletionModel for Ollama {
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };
        let response = self.client.generate(&request, timeout).await?;
        if !response.done {
            warn!(model = %self.model, "Ollama generation ended before completion");
        }
        Ok(response.response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}
