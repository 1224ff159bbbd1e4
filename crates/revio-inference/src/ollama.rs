//! Ollama inference backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use revio_core::{
    defaults, EmbeddingBackend, Error, InferenceBackend, Result, SummarizationBackend,
};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = defaults::OLLAMA_URL;

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = defaults::EMBED_MODEL;

/// Default summarization model.
pub const DEFAULT_SUMMARIZE_MODEL: &str = defaults::SUMMARIZE_MODEL;

/// Default embedding dimension for nomic-embed-text.
pub const DEFAULT_DIMENSION: usize = defaults::EMBED_DIMENSION;

/// Ollama inference backend.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    embed_model: String,
    summarize_model: String,
    dimension: usize,
    embed_timeout_secs: u64,
    summarize_timeout_secs: u64,
}

impl OllamaBackend {
    /// Create a new Ollama backend with default settings.
    pub fn new() -> Self {
        Self::with_config(
            DEFAULT_OLLAMA_URL.to_string(),
            DEFAULT_EMBED_MODEL.to_string(),
            DEFAULT_SUMMARIZE_MODEL.to_string(),
            DEFAULT_DIMENSION,
        )
    }

    /// Create a new Ollama backend with custom configuration.
    pub fn with_config(
        base_url: String,
        embed_model: String,
        summarize_model: String,
        dimension: usize,
    ) -> Self {
        let embed_timeout = std::env::var("REVIO_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::EMBED_TIMEOUT_SECS);

        let summarize_timeout = std::env::var("REVIO_SUMMARIZE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::SUMMARIZE_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(summarize_timeout))
            .build()
            .expect("Failed to create HTTP client");

        info!(
            "Initializing Ollama backend: url={}, embed={}, summarize={}",
            base_url, embed_model, summarize_model
        );

        Self {
            client,
            base_url,
            embed_model,
            summarize_model,
            dimension,
            embed_timeout_secs: embed_timeout,
            summarize_timeout_secs: summarize_timeout,
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("OLLAMA_BASE").unwrap_or_else(|_| DEFAULT_OLLAMA_URL.to_string());
        let embed_model =
            std::env::var("OLLAMA_EMBED_MODEL").unwrap_or_else(|_| DEFAULT_EMBED_MODEL.to_string());
        let summarize_model = std::env::var("OLLAMA_SUMMARIZE_MODEL")
            .unwrap_or_else(|_| DEFAULT_SUMMARIZE_MODEL.to_string());
        let dimension = std::env::var("OLLAMA_EMBED_DIM")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DIMENSION);

        Self::with_config(base_url, embed_model, summarize_model, dimension)
    }
}

impl Default for OllamaBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Chat API message for `/api/chat`.
#[derive(Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Request payload for the Ollama `/api/chat` endpoint.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    /// Disable thinking/reasoning for models that support it (e.g., qwen3).
    /// When `false`, suppresses chain-of-thought reasoning in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
}

/// Response from the Ollama `/api/chat` endpoint.
#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "ollama", op = "embed", model = %self.embed_model, text_len = text.len()))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();

        let request = EmbeddingRequest {
            model: self.embed_model.clone(),
            input: vec![text.to_string()],
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .timeout(Duration::from_secs(self.embed_timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!("Ollama returned {}: {}", status, body)));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("Failed to parse embed response: {}", e)))?;

        let vector = result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend("Ollama returned no embeddings".to_string()))?;

        if vector.len() != self.dimension {
            return Err(Error::Backend(format!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }

        let elapsed = start.elapsed().as_millis() as u64;
        debug!(duration_ms = elapsed, "Embedding complete");
        if elapsed > 5000 {
            warn!(duration_ms = elapsed, slow = true, "Slow embedding operation");
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.embed_model
    }
}

#[async_trait]
impl SummarizationBackend for OllamaBackend {
    #[instrument(skip(self, text), fields(subsystem = "inference", component = "ollama", op = "summarize", model = %self.summarize_model, text_len = text.len()))]
    async fn summarize(&self, text: &str, max_words: usize) -> Result<String> {
        let start = Instant::now();

        let system = format!(
            "You condense study material. Rewrite the user's text in at most \
             {} words, keeping every term, definition, comparison, and list. \
             Output only the condensed text.",
            max_words
        );
        let request = ChatRequest {
            model: self.summarize_model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            stream: false,
            think: Some(false),
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(self.summarize_timeout_secs))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Backend(format!("Ollama returned {}: {}", status, body)));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("Failed to parse chat response: {}", e)))?;

        let content = result.message.content;
        let elapsed = start.elapsed().as_millis() as u64;
        debug!(
            response_len = content.len(),
            duration_ms = elapsed,
            "Summarization complete"
        );
        if elapsed > 30000 {
            warn!(
                duration_ms = elapsed,
                text_len = text.len(),
                slow = true,
                "Slow summarization operation"
            );
        }
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.summarize_model
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn health_check(&self) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => {
                if resp.status().is_success() {
                    info!("Ollama health check passed");
                    Ok(true)
                } else {
                    warn!("Ollama health check failed: {}", resp.status());
                    Ok(false)
                }
            }
            Err(e) => {
                warn!("Ollama health check error: {}", e);
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_configuration() {
        let backend = OllamaBackend::new();
        assert_eq!(EmbeddingBackend::model_name(&backend), DEFAULT_EMBED_MODEL);
        assert_eq!(
            SummarizationBackend::model_name(&backend),
            DEFAULT_SUMMARIZE_MODEL
        );
        assert_eq!(backend.dimension(), DEFAULT_DIMENSION);
    }

    #[test]
    fn chat_request_omits_unset_fields() {
        let request = ChatRequest {
            model: "m".to_string(),
            messages: vec![],
            stream: false,
            think: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("think").is_none());
    }

    #[test]
    fn embedding_response_parses() {
        let json = r#"{"embeddings": [[0.1, 0.2, 0.3]]}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.embeddings[0].len(), 3);
    }
}
