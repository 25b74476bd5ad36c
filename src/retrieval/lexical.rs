//! Substring retrieval with rank-based pseudo-scores

use super::SearchResult;
use crate::error::Result;
use crate::storage::FeedbackStore;
use std::sync::Arc;

/// Normalize a raw query into the term used for substring matching
pub fn lexical_term(query: &str) -> String {
    query.trim().to_lowercase()
}

/// `max(0, 1 - index / len)`: 1.0 for the first result, decaying linearly
pub fn pseudo_score(index: usize, len: usize) -> f32 {
    if len == 0 {
        return 0.0;
    }
    (1.0 - index as f32 / len as f32).max(0.0)
}

/// Lexical search over stored feedback text
pub struct LexicalSearch {
    store: Arc<dyn FeedbackStore>,
}

impl LexicalSearch {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    /// Matches for `query`, most recent first, scored by rank
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let term = lexical_term(query);
        if term.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let items = self.store.find_by_text_substring(&term, limit)?;
        let len = items.len();

        Ok(items
            .iter()
            .enumerate()
            .map(|(index, item)| SearchResult::from_item(item, pseudo_score(index, len)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pseudo_scores() {
        let scores: Vec<f32> = (0..4).map(|i| pseudo_score(i, 4)).collect();
        assert_eq!(scores, vec![1.0, 0.75, 0.5, 0.25]);
    }

    #[test]
    fn test_pseudo_score_edges() {
        assert_eq!(pseudo_score(0, 1), 1.0);
        assert_eq!(pseudo_score(5, 4), 0.0);
        assert_eq!(pseudo_score(0, 0), 0.0);
    }

    #[test]
    fn test_lexical_term() {
        assert_eq!(lexical_term("  Bus STOP "), "bus stop");
        assert_eq!(lexical_term("o'neil st."), "o'neil st.");
    }
}
