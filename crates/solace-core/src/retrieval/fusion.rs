//! Fusion/ranking of curated and semantic retrieval results.
//!
//! Not a pure top-N: a high-confidence curated pick is always admitted, while
//! supplementary picks are limited to one per source, preferring diversity.

use std::collections::HashSet;

use crate::shared::{RetrievalResult, RetrievalSource};

/// Score at or above which a curated result is always admitted.
pub const CAG_THRESHOLD: f32 = 0.85;
/// Minimum score for any other admission.
pub const RAG_THRESHOLD: f32 = 0.70;
/// Maximum fused results.
pub const FUSION_LIMIT: usize = 3;

/// Merges and truncates retrieval results, preferring source diversity.
pub struct FusionRanker {
    cag_threshold: f32,
    rag_threshold: f32,
    limit: usize,
}

impl FusionRanker {
    pub fn new(cag_threshold: f32, rag_threshold: f32, limit: usize) -> Self {
        Self {
            cag_threshold,
            rag_threshold,
            limit,
        }
    }

    /// Walks the score-sorted candidate list: curated results at or above the
    /// CAG threshold are always admitted; anything else needs the RAG
    /// threshold and an unused source slot. Stops at the limit.
    pub fn select(&self, mut results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut selected: Vec<RetrievalResult> = Vec::new();
        let mut admitted_sources: HashSet<RetrievalSource> = HashSet::new();

        for result in results {
            if selected.len() >= self.limit {
                break;
            }
            let priority_curated = result.source == RetrievalSource::Curated
                && result.relevance_score >= self.cag_threshold;
            if priority_curated {
                admitted_sources.insert(result.source);
                selected.push(result);
                continue;
            }
            if result.relevance_score >= self.rag_threshold
                && !admitted_sources.contains(&result.source)
            {
                admitted_sources.insert(result.source);
                selected.push(result);
            }
        }

        selected
    }
}

impl Default for FusionRanker {
    fn default() -> Self {
        Self::new(CAG_THRESHOLD, RAG_THRESHOLD, FUSION_LIMIT)
    }
}
