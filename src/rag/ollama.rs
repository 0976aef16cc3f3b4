use crate::error::Result;
use crate::rag::{NarrativeService, TextEncoder};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434";
const DEFAULT_CHAT_MODEL: &str = "qwen2.5:latest";
const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";
const AVAILABILITY_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub endpoint: String,
    pub chat_model: String,
    pub embed_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
        }
    }
}

/// Client for a local Ollama server, covering both boundary roles:
/// narrative generation and text encoding. Generation runs without a
/// request timeout; a hung server stalls that iteration.
#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    config: OllamaConfig,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    pub fn new(config: OllamaConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    /// Probe the server once; used at startup to decide whether the
    /// encoder gets wired in at all.
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.endpoint);
        match self
            .http
            .get(&url)
            .timeout(AVAILABILITY_PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                log::debug!("ollama probe failed at {url}: {err}");
                false
            }
        }
    }
}

#[async_trait]
impl NarrativeService for OllamaClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = json!({
            "model": self.config.chat_model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": 0.7,
                "num_predict": max_tokens,
            },
        });

        let response = self
            .http
            .post(format!("{}/api/generate", self.config.endpoint))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: GenerateResponse = response.json().await?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl TextEncoder for OllamaClient {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": self.config.embed_model,
            "prompt": text,
        });

        let response = self
            .http
            .post(format!("{}/api/embeddings", self.config.endpoint))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: EmbeddingsResponse = response.json().await?;
        Ok(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_targets_local_server() {
        let config = OllamaConfig::default();
        assert_eq!(config.endpoint, "http://127.0.0.1:11434");
        assert!(!config.chat_model.is_empty());
        assert!(!config.embed_model.is_empty());
    }

    #[tokio::test]
    async fn probe_against_unreachable_server_is_false() {
        let client = OllamaClient::new(OllamaConfig {
            // Reserved TEST-NET address, nothing listens here.
            endpoint: "http://192.0.2.1:1".to_string(),
            ..OllamaConfig::default()
        });
        assert!(!client.is_available().await);
    }
}
