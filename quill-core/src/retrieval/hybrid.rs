//! Hybrid retrieval: both search paths, fused by rank.

use super::fusion::FusionEngine;
use super::keyword::KeywordSearcher;
use super::semantic::SemanticSearcher;
use super::types::{Citable, FusedResult, MetadataFilter, RetrievedItem};
use crate::error::RetrievalError;
use tracing::{debug, info};

/// What retrieval produced, in final rank order.
#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalOutcome {
    /// Lexical and semantic results fused with RRF.
    Hybrid(Vec<FusedResult>),
    /// Semantic results only; fusion was disabled.
    SemanticOnly(Vec<RetrievedItem>),
}

impl RetrievalOutcome {
    pub fn len(&self) -> usize {
        match self {
            RetrievalOutcome::Hybrid(results) => results.len(),
            RetrievalOutcome::SemanticOnly(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The results as citable records, best first.
    pub fn citables(&self) -> Vec<&dyn Citable> {
        match self {
            RetrievalOutcome::Hybrid(results) => results.iter().map(|r| r as &dyn Citable).collect(),
            RetrievalOutcome::SemanticOnly(items) => {
                items.iter().map(|i| i as &dyn Citable).collect()
            }
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            RetrievalOutcome::Hybrid(_) => "hybrid",
            RetrievalOutcome::SemanticOnly(_) => "semantic",
        }
    }
}

/// Runs the keyword and semantic searchers and merges their lists.
#[derive(Clone)]
pub struct HybridRetriever {
    semantic: SemanticSearcher,
    keyword: KeywordSearcher,
    fusion: FusionEngine,
    over_retrieval_factor: usize,
    hybrid: bool,
}

impl HybridRetriever {
    pub fn new(semantic: SemanticSearcher, keyword: KeywordSearcher, fusion: FusionEngine) -> Self {
        Self {
            semantic,
            keyword,
            fusion,
            over_retrieval_factor: 2,
            hybrid: true,
        }
    }

    /// Each path retrieves `factor * top_k` candidates before fusion.
    pub fn with_over_retrieval(mut self, factor: usize) -> Self {
        self.over_retrieval_factor = factor.max(1);
        self
    }

    /// Default mode when a request does not choose one.
    pub fn with_hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = hybrid;
        self
    }

    pub fn hybrid_by_default(&self) -> bool {
        self.hybrid
    }

    /// Retrieve up to `top_k` results.
    ///
    /// In hybrid mode the two paths run concurrently and either failing fails
    /// the whole call. `filter` narrows the semantic path inside the vector
    /// index and the lexical path after hydration.
    pub async fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
        min_similarity: f32,
        hybrid: Option<bool>,
    ) -> Result<RetrievalOutcome, RetrievalError> {
        if !hybrid.unwrap_or(self.hybrid) {
            let list = self
                .semantic
                .search(query, top_k, filter, min_similarity)
                .await?;
            debug!(returned = list.len(), "Semantic-only retrieval complete");
            return Ok(RetrievalOutcome::SemanticOnly(list.into_items()));
        }

        let candidates = top_k.saturating_mul(self.over_retrieval_factor);
        let (semantic, lexical) = tokio::join!(
            self.semantic.search(query, candidates, filter, min_similarity),
            self.keyword.search(query, candidates),
        );
        let semantic = semantic?;
        let mut lexical = lexical?;
        if let Some(filter) = filter {
            lexical.retain(|item| filter.matches(&item.metadata));
        }

        let fused = self.fusion.fuse(&lexical, &semantic, top_k);
        info!(
            semantic = semantic.len(),
            lexical = lexical.len(),
            fused = fused.len(),
            top_k,
            "Hybrid retrieval complete"
        );
        Ok(RetrievalOutcome::Hybrid(fused))
    }
}
