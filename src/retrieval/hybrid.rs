//! Search orchestration: mode selection, vector scan and lexical fallback

use super::{HybridRanker, LexicalSearch, SearchRequest, SearchResponse, SearchResult, SearchType};
use crate::embedding::{
    compare, relevance_score, Embedding, EmbeddingClient, EmbeddingError, SimilarityError,
};
use crate::error::FeedlensError;
use crate::storage::FeedbackStore;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Storage error: {0}")]
    Storage(#[from] FeedlensError),

    /// A stored embedding was produced by an incompatible model
    #[error("{0}")]
    DimensionMismatch(#[from] SimilarityError),

    #[error("Embedding generation failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Feedback item not found: {0}")]
    NotFound(String),
}

impl From<SearchError> for FeedlensError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Storage(inner) => inner,
            SearchError::NotFound(id) => FeedlensError::NotFound { id },
            SearchError::InvalidRequest(message) => FeedlensError::InvalidInput(message),
            other => FeedlensError::Other(anyhow::Error::new(other)),
        }
    }
}

/// Entry point for search requests.
///
/// Tries to embed the query; on success runs hybrid or vector-only
/// retrieval, otherwise falls back to lexical matches. Provider failures
/// never surface as errors from [`SearchOrchestrator::search`].
pub struct SearchOrchestrator {
    client: Arc<EmbeddingClient>,
    store: Arc<dyn FeedbackStore>,
    lexical: LexicalSearch,
    vector_scan_limit: usize,
}

impl SearchOrchestrator {
    pub fn new(
        client: Arc<EmbeddingClient>,
        store: Arc<dyn FeedbackStore>,
        vector_scan_limit: usize,
    ) -> Self {
        Self {
            client,
            lexical: LexicalSearch::new(Arc::clone(&store)),
            store,
            vector_scan_limit,
        }
    }

    /// Run a search. `request` is expected to be validated by the caller.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SearchError> {
        let start = Instant::now();

        let input = self.client.preprocess(&request.query);
        if input.is_empty() {
            debug!("Empty query after preprocessing, returning no results");
            return Ok(Self::respond(&request.query, Vec::new(), SearchType::Text, start));
        }

        let (results, search_type) = match self.client.embed_preprocessed(&input).await {
            Ok(query_embedding) if request.use_hybrid => {
                let lexical = self.lexical.search(&request.query, request.limit)?;

                let mut vector = self.vector_candidates(&query_embedding, None)?;
                sort_by_relevance(&mut vector);
                vector.truncate(request.limit);

                let ranker = HybridRanker::new(request.text_weight, request.vector_weight);
                (ranker.rank(lexical, vector, request.limit), SearchType::Hybrid)
            }
            Ok(query_embedding) => {
                let mut vector = self.vector_candidates(&query_embedding, None)?;
                vector.retain(|r| r.relevance_score >= request.threshold);
                sort_by_relevance(&mut vector);
                vector.truncate(request.limit);

                (vector, SearchType::Vector)
            }
            Err(e) => {
                warn!("Query embedding failed, falling back to text search: {}", e);
                let lexical = self.lexical.search(&request.query, request.limit)?;
                (lexical, SearchType::Text)
            }
        };

        let response = Self::respond(&request.query, results, search_type, start);

        info!(
            "Search ({}) returned {} results in {}ms",
            response.search_type, response.total_results, response.processing_time_ms
        );

        Ok(response)
    }

    /// Items most similar to an existing item.
    ///
    /// Embeds and persists the item's vector first if it has none. Provider
    /// failures are errors here since there is no lexical equivalent.
    pub async fn find_similar(
        &self,
        item_id: &str,
        limit: usize,
        threshold: f32,
    ) -> Result<SearchResponse, SearchError> {
        let start = Instant::now();

        let item = self
            .store
            .get_feedback(item_id)?
            .ok_or_else(|| SearchError::NotFound(item_id.to_string()))?;

        let embedding = match item.embedding {
            Some(embedding) => embedding,
            None => {
                debug!("Item {} has no embedding, generating on demand", item.id);
                let embedding = self.client.embed(&item.text).await?;
                self.store.update_embedding(&item.id, &embedding)?;
                embedding
            }
        };

        let mut results = self.vector_candidates(&embedding, Some(&item.id))?;
        results.retain(|r| r.relevance_score >= threshold);
        sort_by_relevance(&mut results);
        results.truncate(limit);

        let response = Self::respond(item_id, results, SearchType::Vector, start);

        info!(
            "Similar-items lookup for {} returned {} results in {}ms",
            item_id, response.total_results, response.processing_time_ms
        );

        Ok(response)
    }

    /// Score every scanned embedded item against `query`
    fn vector_candidates(
        &self,
        query: &Embedding,
        exclude: Option<&str>,
    ) -> Result<Vec<SearchResult>, SearchError> {
        let items = self.store.scan_items_with_embedding(self.vector_scan_limit)?;

        let mut results = Vec::with_capacity(items.len());
        for item in &items {
            if exclude == Some(item.id.as_str()) {
                continue;
            }
            let Some(stored) = &item.embedding else {
                continue;
            };
            let similarity = compare(query, stored)?;
            results.push(SearchResult::from_item(item, relevance_score(similarity)));
        }

        Ok(results)
    }

    fn respond(
        query: &str,
        results: Vec<SearchResult>,
        search_type: SearchType,
        start: Instant,
    ) -> SearchResponse {
        SearchResponse {
            total_results: results.len(),
            results,
            query: query.to_string(),
            processing_time_ms: start.elapsed().as_millis() as u64,
            search_type,
        }
    }
}

/// Descending by relevance; stable, so equal scores keep scan order
fn sort_by_relevance(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
