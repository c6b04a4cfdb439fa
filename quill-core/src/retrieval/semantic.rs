//! Dense-vector search path.

use super::types::{MetadataFilter, RankedList, RetrievedItem, Score};
use crate::embeddings::Embedder;
use crate::error::RetrievalError;
use crate::index::VectorIndex;
use std::sync::Arc;
use tracing::debug;

/// Embeds the query and ranks chunks by cosine similarity.
///
/// The embedder must be the one the index was built with; the chunk store
/// refuses to open otherwise.
#[derive(Clone)]
pub struct SemanticSearcher {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl SemanticSearcher {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    /// Up to `top_k` items with `similarity >= min_similarity`, best first.
    ///
    /// Similarity is `1 - distance` and is not clamped, so it can be negative.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        filter: Option<&MetadataFilter>,
        min_similarity: f32,
    ) -> Result<RankedList, RetrievalError> {
        if top_k == 0 {
            return Ok(RankedList::default());
        }
        let vector = self.embedder.embed(query).await?;
        let hits = self.index.query(&vector, top_k, filter).await?;
        let returned = hits.len();

        let mut items: Vec<RetrievedItem> = hits
            .into_iter()
            .map(|hit| RetrievedItem {
                chunk_id: hit.chunk_id,
                text: hit.text,
                metadata: hit.metadata,
                score: Score::Similarity(1.0 - hit.distance),
            })
            .filter(|item| item.score.value() >= min_similarity)
            .collect();
        // Stable sort keeps the index's order for equal similarities.
        items.sort_by(|a, b| b.score.value().total_cmp(&a.score.value()));

        debug!(
            returned,
            kept = items.len(),
            min_similarity,
            "Semantic search complete"
        );
        Ok(RankedList::from_ranked(items))
    }
}
