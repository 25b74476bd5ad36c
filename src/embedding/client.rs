//! Retrying, timeout-bounded access to an embedding provider

use super::{preprocess_text, Embedding, EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;
use backon::{ExponentialBuilder, Retryable};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Timeout and exponential backoff settings for provider calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            initial_delay: config.initial_backoff(),
            max_delay: config.max_backoff(),
            timeout: config.request_timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Wraps a provider with preprocessing, a per-attempt timeout and retries.
///
/// Only retryable errors (transport, timeout) are retried; format errors
/// fail on the first attempt.
pub struct EmbeddingClient {
    provider: Arc<dyn EmbeddingProvider>,
    policy: RetryPolicy,
    max_input_chars: usize,
}

impl EmbeddingClient {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, policy: RetryPolicy, max_input_chars: usize) -> Self {
        Self {
            provider,
            policy,
            max_input_chars,
        }
    }

    pub fn from_config(provider: Arc<dyn EmbeddingProvider>, config: &EmbeddingConfig) -> Self {
        Self::new(provider, RetryPolicy::from_config(config), config.max_input_chars)
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Normalize text the same way every provider input is normalized
    pub fn preprocess(&self, text: &str) -> String {
        preprocess_text(text, self.max_input_chars)
    }

    /// Preprocess `text` and embed it
    pub async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let input = self.preprocess(text);
        self.embed_preprocessed(&input).await
    }

    /// Embed text that has already been through [`Self::preprocess`]
    pub async fn embed_preprocessed(&self, input: &str) -> Result<Embedding, EmbeddingError> {
        if input.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }

        let backoff = ExponentialBuilder::default()
            .with_min_delay(self.policy.initial_delay)
            .with_max_delay(self.policy.max_delay)
            .with_max_times(self.policy.max_attempts.saturating_sub(1) as usize);

        let provider = self.provider.as_ref();
        let timeout = self.policy.timeout;

        (|| async move {
            match tokio::time::timeout(timeout, provider.embed(input)).await {
                Ok(result) => result,
                Err(_) => Err(EmbeddingError::Timeout(timeout)),
            }
        })
        .retry(backoff)
        .when(EmbeddingError::is_retryable)
        .notify(|err: &EmbeddingError, delay: Duration| {
            warn!("Embedding attempt failed, retrying in {:?}: {}", delay, err);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Fails with the given error for the first `failures` calls
    struct FlakyProvider {
        failures: usize,
        error: EmbeddingError,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl FlakyProvider {
        fn new(failures: usize, error: EmbeddingError) -> Self {
            Self {
                failures,
                error,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyProvider {
        async fn embed(&self, _text: &str) -> Result<Embedding, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if call < self.failures {
                Err(self.error.clone())
            } else {
                Ok(Embedding::new(vec![1.0, 0.0], "flaky"))
            }
        }

        fn dimension(&self) -> Option<usize> {
            Some(2)
        }

        fn model_name(&self) -> &str {
            "flaky"
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_errors() {
        let provider = Arc::new(FlakyProvider::new(
            2,
            EmbeddingError::Transport("503 Service Unavailable".into()),
        ));
        let client = EmbeddingClient::new(provider.clone(), fast_policy(3), 512);

        let embedding = client.embed("Broken streetlight").await.unwrap();
        assert_eq!(embedding.dimensions(), 2);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let provider = Arc::new(FlakyProvider::new(
            10,
            EmbeddingError::Transport("connection reset".into()),
        ));
        let client = EmbeddingClient::new(provider.clone(), fast_policy(3), 512);

        let err = client.embed("Broken streetlight").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Transport(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_format_error_fails_fast() {
        let provider = Arc::new(FlakyProvider::new(
            10,
            EmbeddingError::Format("unexpected shape".into()),
        ));
        let client = EmbeddingClient::new(provider.clone(), fast_policy(3), 512);

        let err = client.embed("Broken streetlight").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Format(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retried() {
        let mut flaky = FlakyProvider::new(0, EmbeddingError::EmptyInput);
        flaky.delay = Duration::from_millis(200);
        let provider = Arc::new(flaky);

        let mut policy = fast_policy(2);
        policy.timeout = Duration::from_millis(10);
        let client = EmbeddingClient::new(provider.clone(), policy, 512);

        let err = client.embed("slow provider").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Timeout(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_input_skips_provider() {
        let provider = Arc::new(FlakyProvider::new(0, EmbeddingError::EmptyInput));
        let client = EmbeddingClient::new(provider.clone(), fast_policy(3), 512);

        let err = client.embed("  ?!  ").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::EmptyInput));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
