//! Embedding provider trait and FastEmbed implementation

use super::Embedding;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EmbeddingError {
    /// Network failure, 5xx or rate limiting. Retryable.
    #[error("Provider transport error: {0}")]
    Transport(String),

    /// The provider did not answer within the per-attempt timeout. Retryable.
    #[error("Provider timed out after {0:?}")]
    Timeout(Duration),

    /// The response did not contain a usable vector. Not retryable.
    #[error("Provider format error: {0}")]
    Format(String),

    #[error("Input is empty after preprocessing")]
    EmptyInput,

    #[error("Model initialization failed: {0}")]
    Initialization(String),
}

impl EmbeddingError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }
}

/// Trait for embedding providers
///
/// Providers perform a single attempt per call; retries and timeouts are
/// applied by [`super::EmbeddingClient`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for already-preprocessed text
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    /// Expected vector dimension, when known ahead of time
    fn dimension(&self) -> Option<usize>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// FastEmbed provider for local embedding generation
///
/// Uses all-MiniLM-L6-v2 model (384 dimensions) by default.
/// Optimized for offline operation with no API calls.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_name: String,
    dimension: usize,
}

impl FastEmbedProvider {
    /// Create a new FastEmbed provider with the specified model
    ///
    /// **Important**: Models are downloaded on-demand to `~/.cache/huggingface/`
    /// on first use. The smallest model (all-MiniLM-L6-v2) is ~90MB.
    pub fn new(model_name: &str) -> Result<Self, EmbeddingError> {
        let (embedding_model, dimension, model_size_mb) = match model_name {
            "all-MiniLM-L6-v2" | "all-minilm-l6-v2" => (EmbeddingModel::AllMiniLML6V2, 384, 90),
            "bge-small-en-v1.5" => (EmbeddingModel::BGESmallENV15, 384, 130),
            "bge-base-en-v1.5" => (EmbeddingModel::BGEBaseENV15, 768, 440),
            _ => {
                return Err(EmbeddingError::Initialization(format!(
                    "Unsupported model: {}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                    model_name
                )));
            }
        };

        tracing::info!(
            "Initializing embedding model: {} ({}D, ~{}MB download if not cached)",
            model_name,
            dimension,
            model_size_mb
        );

        let init_options = InitOptions::new(embedding_model).with_show_download_progress(true);

        let model = TextEmbedding::try_new(init_options)
            .map_err(|e| EmbeddingError::Initialization(e.to_string()))?;

        Ok(Self {
            model: Arc::new(model),
            model_name: model_name.to_string(),
            dimension,
        })
    }

    /// Create provider with default model (all-MiniLM-L6-v2)
    pub fn with_default_model() -> Result<Self, EmbeddingError> {
        Self::new("all-MiniLM-L6-v2")
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        if text.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        // Inference is CPU-bound
        let model = Arc::clone(&self.model);
        let input = text.to_string();
        let embeddings = tokio::task::spawn_blocking(move || model.embed(vec![input], None))
            .await
            .map_err(|e| EmbeddingError::Transport(format!("Embedding task failed: {}", e)))?
            .map_err(|e| EmbeddingError::Format(e.to_string()))?;

        let vector = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::Format("No embeddings generated".to_string()))?;

        if vector.len() != self.dimension {
            return Err(EmbeddingError::Format(format!(
                "Dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }

        Ok(Embedding::new(vector, &self.model_name))
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Stand-in for a provider that could not be constructed.
///
/// Every call fails with the original initialization error, so search
/// degrades to lexical matching instead of refusing to run.
pub struct UnavailableProvider {
    reason: String,
}

impl UnavailableProvider {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for UnavailableProvider {
    async fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
        Err(EmbeddingError::Initialization(self.reason.clone()))
    }

    fn dimension(&self) -> Option<usize> {
        None
    }

    fn model_name(&self) -> &str {
        "unavailable"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::cosine_similarity;

    #[test]
    fn test_retryable_classification() {
        assert!(EmbeddingError::Transport("503".into()).is_retryable());
        assert!(EmbeddingError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(!EmbeddingError::Format("bad shape".into()).is_retryable());
        assert!(!EmbeddingError::EmptyInput.is_retryable());
        assert!(!EmbeddingError::Initialization("missing".into()).is_retryable());
    }

    #[test]
    fn test_unsupported_model() {
        let result = FastEmbedProvider::new("word2vec");
        assert!(matches!(result, Err(EmbeddingError::Initialization(_))));
    }

    #[tokio::test]
    async fn test_unavailable_provider_always_fails() {
        let provider = UnavailableProvider::new("model missing");
        let err = provider.embed("broken streetlight").await.unwrap_err();

        assert!(matches!(err, EmbeddingError::Initialization(ref m) if m == "model missing"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    async fn test_single_embedding() {
        let provider = FastEmbedProvider::with_default_model().unwrap();
        let embedding = provider
            .embed("the streetlight on elm street is broken")
            .await
            .unwrap();

        assert_eq!(embedding.dimensions(), 384);
        assert_eq!(embedding.model(), "all-MiniLM-L6-v2");
    }

    #[tokio::test]
    #[ignore] // Requires model download (~90MB) - run with: cargo test -- --ignored
    async fn test_semantic_similarity() {
        let provider = FastEmbedProvider::with_default_model().unwrap();

        let pothole = provider.embed("large pothole on the main road").await.unwrap();
        let road = provider.embed("the street surface is badly damaged").await.unwrap();
        let library = provider.embed("extend library opening hours").await.unwrap();

        let sim_related = cosine_similarity(pothole.vector(), road.vector()).unwrap();
        let sim_unrelated = cosine_similarity(pothole.vector(), library.vector()).unwrap();

        assert!(sim_related > sim_unrelated);
    }
}
