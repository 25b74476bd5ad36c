//! Category and sentiment classification of incoming feedback
//!
//! The classifier itself is an external collaborator behind the
//! [`Classifier`] trait. Ingestion never waits on it: jobs go through a
//! bounded [`ClassificationQueue`] whose worker records the outcome on the
//! stored item.

mod http;
mod queue;

pub use http::HttpClassifier;
pub use queue::{ClassificationJob, ClassificationQueue, ClassificationStats};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ClassifyError {
    #[error("Classifier transport error: {0}")]
    Transport(String),

    #[error("Classifier format error: {0}")]
    Format(String),

    #[error("Classification queue is full")]
    QueueFull,

    #[error("Classification queue is closed")]
    QueueClosed,
}

/// Label and score for one piece of feedback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    /// In [-1, 1]
    pub sentiment: f32,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification, ClassifyError>;
}
