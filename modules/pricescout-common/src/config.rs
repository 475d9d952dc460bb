use std::env;

use tracing::info;

/// Process configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub ollama_host: String,
    pub ollama_model: String,
}

impl Config {
    /// Load configuration, falling back to local-development defaults.
    pub fn from_env() -> Self {
        let ollama_host =
            env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost:11434".to_string());
        info!(ollama_host, "Config loaded");

        Self {
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("PORT must be a number"),
            ollama_host,
            ollama_model: env::var("OLLAMA_MODEL").unwrap_or_else(|_| "phi3:mini".to_string()),
        }
    }
}
