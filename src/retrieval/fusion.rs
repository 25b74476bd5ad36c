//! Weighted additive fusion of lexical and vector result sets

use super::SearchResult;
use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};

/// Fuses two scored result lists into one deduplicated ranking.
///
/// `score = pseudoScore * text_weight + relevance * vector_weight`, where an
/// item found by only one path gets only that path's term. The weights are
/// independent; their sum is not constrained, so fused scores may exceed 1.
#[derive(Debug, Clone, Copy)]
pub struct HybridRanker {
    pub text_weight: f32,
    pub vector_weight: f32,
}

impl HybridRanker {
    pub fn new(text_weight: f32, vector_weight: f32) -> Self {
        Self {
            text_weight,
            vector_weight,
        }
    }

    /// Fuse and truncate to `limit`. Ties keep first-seen order, lexical first.
    pub fn rank(
        &self,
        lexical: Vec<SearchResult>,
        vector: Vec<SearchResult>,
        limit: usize,
    ) -> Vec<SearchResult> {
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut fused: Vec<SearchResult> = Vec::with_capacity(lexical.len() + vector.len());

        for mut result in lexical {
            if positions.contains_key(&result.item_id) {
                continue;
            }
            result.relevance_score *= self.text_weight;
            positions.insert(result.item_id.clone(), fused.len());
            fused.push(result);
        }

        let mut seen_vector: HashSet<String> = HashSet::new();
        for mut result in vector {
            if !seen_vector.insert(result.item_id.clone()) {
                continue;
            }
            let contribution = result.relevance_score * self.vector_weight;
            match positions.get(&result.item_id) {
                Some(&index) => fused[index].relevance_score += contribution,
                None => {
                    result.relevance_score = contribution;
                    positions.insert(result.item_id.clone(), fused.len());
                    fused.push(result);
                }
            }
        }

        // Vec::sort_by is stable
        fused.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        fused.truncate(limit);

        fused
    }
}
