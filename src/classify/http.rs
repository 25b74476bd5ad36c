//! HTTP-backed classifier for category and sentiment

use super::{Classification, ClassifyError, Classifier};
use crate::config::ClassificationConfig;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Classifier backed by an HTTP service.
///
/// Posts `{"text": ...}` and expects `{"category": ..., "sentiment": ...}`.
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    category: String,
    sentiment: f32,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &ClassificationConfig) -> Self {
        let classifier = Self::new(&config.endpoint);

        if config.api_key_env.is_empty() {
            return classifier;
        }

        match std::env::var(&config.api_key_env) {
            Ok(key) if !key.is_empty() => classifier.with_api_key(key),
            _ => classifier,
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&serde_json::json!({ "text": text }));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ClassifyError::Transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = format!("Classifier returned {}", status);
            return Err(if status.is_server_error() {
                ClassifyError::Transport(message)
            } else {
                ClassifyError::Format(message)
            });
        }

        let body: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::Format(format!("Unexpected response: {}", e)))?;

        Ok(normalize(body))
    }
}

fn normalize(body: ClassifyResponse) -> Classification {
    let sentiment = if body.sentiment.is_finite() {
        body.sentiment.clamp(-1.0, 1.0)
    } else {
        0.0
    };

    Classification {
        category: body.category.trim().to_lowercase(),
        sentiment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_is_clamped() {
        let parsed: ClassifyResponse =
            serde_json::from_str(r#"{"category": " Roads ", "sentiment": -3.5}"#).unwrap();
        let classification = normalize(parsed);

        assert_eq!(classification.category, "roads");
        assert_eq!(classification.sentiment, -1.0);
    }

    #[test]
    fn test_missing_fields_fail_to_parse() {
        let parsed = serde_json::from_str::<ClassifyResponse>(r#"{"label": "roads"}"#);
        assert!(parsed.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let classifier = HttpClassifier::new("http://127.0.0.1:9/classify")
            .with_timeout(Duration::from_secs(2));
        let err = classifier.classify("hello").await.unwrap_err();
        assert!(matches!(err, ClassifyError::Transport(_)));
    }
}
