//! Storage layer for feedlens
//!
//! Feedback items and their embeddings live in SQLite. Search, backfill and
//! classification all go through the [`FeedbackStore`] trait so they can run
//! concurrently against the same database without sharing any other state.

pub mod database;

use crate::embedding::Embedding;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use database::{Database, DbPool};

/// Progress of the external classification of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassificationStatus {
    /// Stored, not classified yet
    Pending,
    /// Category and sentiment recorded
    Done,
    /// The classifier failed for this item
    Failed,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A stored piece of citizen feedback
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackItem {
    pub id: String,
    pub text: String,
    pub category: Option<String>,
    /// In [-1, 1] once classified
    pub sentiment: Option<f32>,
    pub timestamp: DateTime<Utc>,
    pub classification_status: ClassificationStatus,
    #[serde(skip)]
    pub embedding: Option<Embedding>,
}

/// Result of classifying one item
#[derive(Debug, Clone, PartialEq)]
pub enum ClassificationOutcome {
    Classified { category: String, sentiment: f32 },
    Failed,
}

/// How much of the corpus is searchable by vector
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingCoverage {
    pub items_with_embedding: usize,
    pub items_without_embedding: usize,
    pub embedding_coverage_percent: f64,
}

impl EmbeddingCoverage {
    pub fn from_counts(total: usize, with_embedding: usize) -> Self {
        let with_embedding = with_embedding.min(total);
        let percent = if total == 0 {
            0.0
        } else {
            (with_embedding as f64 / total as f64 * 10_000.0).round() / 100.0
        };

        Self {
            items_with_embedding: with_embedding,
            items_without_embedding: total - with_embedding,
            embedding_coverage_percent: percent,
        }
    }
}

/// Storage boundary used by the search and embedding subsystem
pub trait FeedbackStore: Send + Sync {
    /// Store a new, unclassified and unembedded item
    fn insert_feedback(&self, text: &str, timestamp: DateTime<Utc>) -> Result<FeedbackItem>;

    fn get_feedback(&self, id: &str) -> Result<Option<FeedbackItem>>;

    /// Delete an item together with its embedding
    fn delete_feedback(&self, id: &str) -> Result<bool>;

    /// Items without an embedding, oldest first
    fn items_missing_embedding(&self, limit: usize) -> Result<Vec<FeedbackItem>>;

    /// Attach (or replace) the embedding of an item. `false` if the item does not exist.
    fn update_embedding(&self, id: &str, embedding: &Embedding) -> Result<bool>;

    /// Case-insensitive substring match, most recent first
    fn find_by_text_substring(&self, term: &str, limit: usize) -> Result<Vec<FeedbackItem>>;

    /// The most recent items that have an embedding
    fn scan_items_with_embedding(&self, limit: usize) -> Result<Vec<FeedbackItem>>;

    /// Record a classification result. `false` if the item does not exist.
    fn update_classification(&self, id: &str, outcome: &ClassificationOutcome) -> Result<bool>;

    fn embedding_coverage(&self) -> Result<EmbeddingCoverage>;
}
