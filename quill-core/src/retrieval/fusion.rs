//! Reciprocal Rank Fusion: score = w_lex/(k + rank_lex) + w_sem/(k + rank_sem)
//!
//! Merges the lexical and semantic ranked lists without comparing their raw
//! scores, which live on unrelated scales. A chunk missing from one list
//! simply gets no contribution from it.

use super::types::{FusedResult, RankedList, RetrievedItem};
use crate::config::RetrievalConfig;
use std::collections::HashMap;

/// RRF parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig {
    /// Smoothing constant. Higher values flatten the gap between top ranks.
    pub k: f64,
    pub lexical_weight: f64,
    pub semantic_weight: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            k: 60.0,
            lexical_weight: 0.5,
            semantic_weight: 0.5,
        }
    }
}

impl From<&RetrievalConfig> for FusionConfig {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            k: config.rrf_k,
            lexical_weight: config.lexical_weight,
            semantic_weight: config.semantic_weight,
        }
    }
}

#[derive(Default)]
struct Candidate<'a> {
    lexical: Option<(usize, &'a RetrievedItem)>,
    semantic: Option<(usize, &'a RetrievedItem)>,
}

/// Stateless rank fuser.
#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    config: FusionConfig,
}

impl FusionEngine {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    /// Contribution of one list at a 1-based `rank`.
    fn contribution(&self, weight: f64, rank: usize) -> f64 {
        weight / (self.config.k + rank as f64)
    }

    /// Fuse both lists and keep the best `top_k`.
    ///
    /// Ordering is by descending fusion score, then ascending `chunk_id`, so
    /// the output is fully determined by the inputs. Text and metadata come
    /// from the semantic hit when there is one.
    pub fn fuse(&self, lexical: &RankedList, semantic: &RankedList, top_k: usize) -> Vec<FusedResult> {
        let mut candidates: HashMap<&str, Candidate<'_>> = HashMap::new();
        for (rank, item) in lexical.ranked() {
            let entry = candidates.entry(item.chunk_id.as_str()).or_default();
            // Lists are unique by id; keep the best rank if one repeats.
            entry.lexical.get_or_insert((rank, item));
        }
        for (rank, item) in semantic.ranked() {
            let entry = candidates.entry(item.chunk_id.as_str()).or_default();
            entry.semantic.get_or_insert((rank, item));
        }

        let mut fused: Vec<FusedResult> = candidates
            .into_values()
            .filter_map(|candidate| self.merge(candidate))
            .collect();

        fused.sort_by(|a, b| {
            b.fusion_score
                .total_cmp(&a.fusion_score)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        fused.truncate(top_k);
        fused
    }

    fn merge(&self, candidate: Candidate<'_>) -> Option<FusedResult> {
        let lexical_part = candidate
            .lexical
            .map_or(0.0, |(rank, _)| self.contribution(self.config.lexical_weight, rank));
        let semantic_part = candidate
            .semantic
            .map_or(0.0, |(rank, _)| self.contribution(self.config.semantic_weight, rank));
        let (_, source) = candidate.semantic.or(candidate.lexical)?;

        Some(FusedResult {
            chunk_id: source.chunk_id.clone(),
            fusion_score: lexical_part + semantic_part,
            text: source.text.clone(),
            metadata: source.metadata.clone(),
            lexical_score: candidate.lexical.map(|(_, item)| item.score.value()),
            similarity_score: candidate.semantic.map(|(_, item)| item.score.value()),
        })
    }
}
