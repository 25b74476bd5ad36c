//! Embedding generation and lifecycle
//!
//! Architecture:
//! - EmbeddingProvider trait for abstraction over embedding backends
//! - FastEmbedProvider for local embedding (offline mode)
//! - HttpEmbeddingProvider for an external embedding service (online mode)
//! - EmbeddingClient applies preprocessing, timeout and retry around a provider
//! - EmbeddingBackfillJob fills in vectors for items stored without one
mod backfill;
mod client;
mod http;
mod preprocess;
mod provider;
mod similarity;

pub use backfill::{BackfillOutcome, BackfillScheduler, EmbeddingBackfillJob};
pub use client::{EmbeddingClient, RetryPolicy};
pub use http::HttpEmbeddingProvider;
pub use preprocess::preprocess_text;
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider, UnavailableProvider};
pub use similarity::{compare, cosine_similarity, relevance_score, SimilarityError};

use crate::config::EmbeddingConfig;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

/// A vector representation of a piece of text.
///
/// `dimensions` always equals `vector.len()`; the fields are private so the
/// record cannot be built in an inconsistent state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Embedding {
    vector: Vec<f32>,
    model: String,
    dimensions: usize,
    generated_at: DateTime<Utc>,
}

impl Embedding {
    /// Create an embedding stamped with the current time
    pub fn new(vector: Vec<f32>, model: impl Into<String>) -> Self {
        Self::with_timestamp(vector, model, Utc::now())
    }

    pub fn with_timestamp(
        vector: Vec<f32>,
        model: impl Into<String>,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let dimensions = vector.len();
        Self {
            vector,
            model: model.into(),
            dimensions,
            generated_at,
        }
    }

    /// Decode the storage form: little-endian `f32` values packed back to back.
    pub fn from_bytes(
        bytes: &[u8],
        model: impl Into<String>,
        dimensions: usize,
        generated_at: DateTime<Utc>,
    ) -> Result<Self, EmbeddingError> {
        let expected = dimensions.checked_mul(4).ok_or_else(|| {
            EmbeddingError::Format(format!("Dimension count {} is out of range", dimensions))
        })?;
        if bytes.len() != expected {
            return Err(EmbeddingError::Format(format!(
                "Vector blob is {} bytes, expected {} for {} dimensions",
                bytes.len(),
                expected,
                dimensions
            )));
        }

        let vector = bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self::with_timestamp(vector, model, generated_at))
    }

    /// Encode the vector for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        self.vector.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }
}

/// Build the provider selected by `embedding.mode`.
///
/// Constructed once at startup and shared by search, backfill and the
/// similar-items lookup.
pub fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>, EmbeddingError> {
    match config.mode.as_str() {
        "online" => Ok(Arc::new(HttpEmbeddingProvider::from_config(config))),
        "offline" => Ok(Arc::new(FastEmbedProvider::new(&config.model)?)),
        other => Err(EmbeddingError::Initialization(format!(
            "Unknown embedding mode: {}",
            other
        ))),
    }
}

/// Like [`build_provider`], but a provider that fails to start is replaced
/// by an [`UnavailableProvider`] so callers that can degrade keep running.
pub fn build_provider_or_unavailable(config: &EmbeddingConfig) -> Arc<dyn EmbeddingProvider> {
    match build_provider(config) {
        Ok(provider) => provider,
        Err(e) => {
            tracing::warn!("Embedding provider unavailable, text search only: {}", e);
            Arc::new(UnavailableProvider::new(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_follow_vector() {
        let embedding = Embedding::new(vec![0.1, 0.2, 0.3], "test-model");
        assert_eq!(embedding.dimensions(), 3);
        assert_eq!(embedding.model(), "test-model");
    }

    #[test]
    fn test_blob_encoding() {
        let embedding = Embedding::new(vec![1.0, -0.5, 0.25, 3.5], "test-model");
        let bytes = embedding.to_bytes();
        assert_eq!(bytes.len(), 16);

        let decoded =
            Embedding::from_bytes(&bytes, "test-model", 4, embedding.generated_at()).unwrap();
        assert_eq!(decoded, embedding);
    }

    #[test]
    fn test_blob_length_mismatch() {
        let bytes = Embedding::new(vec![1.0, 2.0], "m").to_bytes();
        let result = Embedding::from_bytes(&bytes, "m", 3, Utc::now());
        assert!(matches!(result, Err(EmbeddingError::Format(_))));
    }

    #[test]
    fn test_blob_dimension_overflow() {
        let bytes = Embedding::new(vec![1.0, 2.0], "m").to_bytes();
        let result = Embedding::from_bytes(&bytes, "m", usize::MAX, Utc::now());
        assert!(matches!(result, Err(EmbeddingError::Format(_))));
    }

    #[test]
    fn test_unknown_mode() {
        let config = EmbeddingConfig {
            mode: "hybrid".to_string(),
            ..crate::config::Config::default().embedding
        };
        assert!(matches!(
            build_provider(&config),
            Err(EmbeddingError::Initialization(_))
        ));
    }

    #[test]
    fn test_failed_provider_is_replaced() {
        let config = EmbeddingConfig {
            mode: "offline".to_string(),
            model: "word2vec".to_string(),
            ..crate::config::Config::default().embedding
        };
        let provider = build_provider_or_unavailable(&config);
        assert_eq!(provider.model_name(), "unavailable");
    }

    #[test]
    fn test_online_mode_builds_http_provider() {
        let config = EmbeddingConfig {
            mode: "online".to_string(),
            endpoint: "http://localhost:9/embed".to_string(),
            model: "text-embedding-3-small".to_string(),
            ..crate::config::Config::default().embedding
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "text-embedding-3-small");
    }
}
