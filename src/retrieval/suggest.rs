//! Autocomplete phrases derived from lexical matches

use crate::error::{FeedlensError, Result};
use crate::storage::FeedbackStore;
use ahash::{HashSet, HashSetExt};
use regex::Regex;
use std::sync::Arc;

const WORD_PATTERN: &str = r"[\w']+";

/// Suggests the partial query extended by one word, taken from stored text
pub struct SuggestionGenerator {
    store: Arc<dyn FeedbackStore>,
    min_query_chars: usize,
    word_regex: Regex,
}

impl SuggestionGenerator {
    pub fn new(store: Arc<dyn FeedbackStore>, min_query_chars: usize) -> Result<Self> {
        let word_regex = Regex::new(WORD_PATTERN)
            .map_err(|e| FeedlensError::Other(anyhow::anyhow!("Invalid word pattern: {}", e)))?;

        Ok(Self {
            store,
            min_query_chars,
            word_regex,
        })
    }

    /// Up to `limit` lowercase phrases starting with `partial_query`
    pub fn suggest(&self, partial_query: &str, limit: usize) -> Result<Vec<String>> {
        let partial = partial_query.trim().to_lowercase();
        if limit == 0 || partial.chars().count() < self.min_query_chars {
            return Ok(Vec::new());
        }

        let window = self.word_regex.find_iter(&partial).count() + 1;
        let items = self
            .store
            .find_by_text_substring(&partial, limit.saturating_mul(2))?;

        let mut seen = HashSet::new();
        let mut suggestions = Vec::new();

        for item in &items {
            let words: Vec<String> = self
                .word_regex
                .find_iter(&item.text)
                .map(|m| m.as_str().to_lowercase())
                .collect();

            for phrase_words in words.windows(window) {
                let phrase = phrase_words.join(" ");
                if phrase.starts_with(&partial) && seen.insert(phrase.clone()) {
                    suggestions.push(phrase);
                    if suggestions.len() == limit {
                        return Ok(suggestions);
                    }
                }
            }
        }

        Ok(suggestions)
    }
}
