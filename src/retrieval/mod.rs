//! Hybrid retrieval over stored feedback
//!
//! Combines case-insensitive substring matching with a bounded cosine
//! similarity scan over stored embeddings, fused by weighted addition.
//! When the embedding provider is unavailable, search degrades to lexical
//! matches instead of failing.

mod fusion;
mod hybrid;
mod lexical;
mod suggest;

pub use fusion::HybridRanker;
pub use hybrid::{SearchError, SearchOrchestrator};
pub use lexical::{lexical_term, pseudo_score, LexicalSearch};
pub use suggest::SuggestionGenerator;

use crate::config::SearchConfig;
use crate::storage::FeedbackItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which retrieval path produced a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Hybrid,
    Vector,
    /// Lexical fallback (provider unavailable or empty query)
    Text,
}

impl std::fmt::Display for SearchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Hybrid => "hybrid",
            Self::Vector => "vector",
            Self::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// Search parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub limit: usize,
    /// Minimum relevance score, applied in vector-only mode
    pub threshold: f32,
    pub use_hybrid: bool,
    pub text_weight: f32,
    pub vector_weight: f32,
}

impl SearchRequest {
    /// A request for `query` using the configured defaults
    pub fn new(query: impl Into<String>, config: &SearchConfig) -> Self {
        Self {
            query: query.into(),
            limit: config.default_limit,
            threshold: config.default_threshold,
            use_hybrid: config.use_hybrid,
            text_weight: config.text_weight,
            vector_weight: config.vector_weight,
        }
    }

    /// Boundary check for caller-supplied parameters
    pub fn validate(&self, config: &SearchConfig) -> Result<(), SearchError> {
        if self.limit == 0 || self.limit > config.max_limit {
            return Err(SearchError::InvalidRequest(format!(
                "limit must be between 1 and {}, got {}",
                config.max_limit, self.limit
            )));
        }

        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(SearchError::InvalidRequest(format!(
                "threshold must be between 0 and 1, got {}",
                self.threshold
            )));
        }

        for (name, weight) in [
            ("textWeight", self.text_weight),
            ("vectorWeight", self.vector_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SearchError::InvalidRequest(format!(
                    "{} must be a non-negative number, got {}",
                    name, weight
                )));
            }
        }

        Ok(())
    }
}

/// One ranked item, denormalized at search time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub item_id: String,
    pub text: String,
    pub category: Option<String>,
    pub sentiment: Option<f32>,
    pub timestamp: DateTime<Utc>,
    pub relevance_score: f32,
}

impl SearchResult {
    pub fn from_item(item: &FeedbackItem, relevance_score: f32) -> Self {
        Self {
            item_id: item.id.clone(),
            text: item.text.clone(),
            category: item.category.clone(),
            sentiment: item.sentiment,
            timestamp: item.timestamp,
            relevance_score,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub query: String,
    pub total_results: usize,
    pub processing_time_ms: u64,
    pub search_type: SearchType,
}

/// Autocomplete response
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionResponse {
    pub suggestions: Vec<String>,
}
