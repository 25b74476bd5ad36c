//! Embedding provider backed by an external HTTP embedding service

use super::{Embedding, EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

/// Client for a JSON embedding endpoint.
///
/// Sends `{"model": ..., "input": ...}` and accepts a flat vector, a nested
/// vector, `{"embedding": ...}` or `{"data": [{"embedding": ...}]}`.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimension: Option<usize>,
}

impl HttpEmbeddingProvider {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            dimension: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Reject responses whose vector length differs from `dimension`
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Build from configuration, reading the API key from `api_key_env` if set
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        let mut provider = Self::new(&config.endpoint, &config.model);

        if !config.api_key_env.is_empty() {
            match std::env::var(&config.api_key_env) {
                Ok(key) if !key.is_empty() => provider = provider.with_api_key(key),
                _ => tracing::debug!(
                    "No API key in {}, calling embedding service unauthenticated",
                    config.api_key_env
                ),
            }
        }

        if config.dimension > 0 {
            provider = provider.with_dimension(config.dimension);
        }

        provider
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let message = format!("Embedding service returned {}: {}", status, error_text);
            return Err(if is_transient_status(status) {
                EmbeddingError::Transport(message)
            } else {
                EmbeddingError::Format(message)
            });
        }

        let payload: Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                EmbeddingError::Format(format!("Response is not valid JSON: {}", e))
            } else {
                EmbeddingError::Transport(format!("Failed to read response body: {}", e))
            }
        })?;

        let vector = extract_vector(&payload)?;

        if let Some(expected) = self.dimension {
            if vector.len() != expected {
                return Err(EmbeddingError::Format(format!(
                    "Dimension mismatch: expected {}, got {}",
                    expected,
                    vector.len()
                )));
            }
        }

        Ok(Embedding::new(vector, &self.model))
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn is_transient_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
}

/// Pull the embedding vector out of any of the accepted response shapes
pub(crate) fn extract_vector(payload: &Value) -> Result<Vec<f32>, EmbeddingError> {
    let candidate = match payload {
        Value::Array(_) => payload,
        Value::Object(map) => {
            if let Some(embedding) = map.get("embedding") {
                embedding
            } else if let Some(embedding) = map
                .get("data")
                .and_then(|data| data.get(0))
                .and_then(|first| first.get("embedding"))
            {
                embedding
            } else {
                return Err(EmbeddingError::Format(
                    "Response has neither an 'embedding' nor a 'data' field".to_string(),
                ));
            }
        }
        _ => {
            return Err(EmbeddingError::Format(
                "Response is neither an array nor an object".to_string(),
            ));
        }
    };

    let values = match candidate.as_array() {
        // Nested form: the first row is the vector for our single input
        Some(rows) if matches!(rows.first(), Some(Value::Array(_))) => {
            rows[0].as_array().map(Vec::as_slice).unwrap_or_default()
        }
        Some(values) => values.as_slice(),
        None => {
            return Err(EmbeddingError::Format(
                "Embedding is not an array".to_string(),
            ));
        }
    };

    if values.is_empty() {
        return Err(EmbeddingError::Format("Embedding vector is empty".to_string()));
    }

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| EmbeddingError::Format(format!("Non-numeric vector element: {}", v)))
        })
        .collect()
}
