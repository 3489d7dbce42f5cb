//! HTTP embedding provider.
//!
//! POSTs `{"model": ..., "input": ...}` to a configurable endpoint and reads
//! `{"embedding": [..]}` back.  The wire shape is deliberately thin; the
//! real boundary is the [`EmbeddingProvider`] trait, and anything
//! provider-specific belongs in a sibling implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use policy_core::{EmbeddingError, EmbeddingProvider};

/// Settings for [`HttpEmbeddingProvider`].
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Full URL of the embedding endpoint.
    pub endpoint: String,
    /// Bearer token sent with each request, if the API requires one.
    pub api_key: Option<String>,
    /// Model identifier forwarded in the request body.
    pub model: String,
    /// Request timeout.  The embedding call sits on the evaluation's
    /// critical path, so an unresponsive provider must fail fast.
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

/// [`EmbeddingProvider`] backed by an external HTTP embedding API.
pub struct HttpEmbeddingProvider {
    http: reqwest::Client,
    config: HttpProviderConfig,
}

impl HttpEmbeddingProvider {
    pub fn new(config: HttpProviderConfig) -> Result<Self, EmbeddingError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "input": text,
        });

        let mut request = self.http.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EmbeddingError::Timeout(self.config.timeout)
            } else {
                EmbeddingError::Request(e.to_string())
            }
        })?;

        let response = response
            .error_for_status()
            .map_err(|e| EmbeddingError::Request(e.to_string()))?;

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Response(e.to_string()))?;

        if parsed.embedding.is_empty() {
            return Err(EmbeddingError::Response(
                "provider returned an empty embedding".into(),
            ));
        }

        debug!(dimensions = parsed.embedding.len(), "received embedding");
        Ok(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape_parses() {
        let parsed: EmbedResponse =
            serde_json::from_str(r#"{"embedding": [0.1, -0.2, 0.3]}"#).unwrap();
        assert_eq!(parsed.embedding.len(), 3);
    }

    #[test]
    fn client_builds_from_config() {
        let provider = HttpEmbeddingProvider::new(HttpProviderConfig {
            endpoint: "http://127.0.0.1:9/embed".into(),
            api_key: Some("key".into()),
            model: "test-embedding-001".into(),
            timeout: Duration::from_secs(5),
        });
        assert!(provider.is_ok());
    }
}
