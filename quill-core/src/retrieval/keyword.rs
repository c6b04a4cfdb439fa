//! Lexical search path.

use super::types::{RankedList, RetrievedItem, Score};
use crate::error::RetrievalError;
use crate::index::{ChunkStore, LexicalIndex, analyze};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Tokenizes the query with the index analyzer, ranks ids with the lexical
/// index, then hydrates text and metadata from the chunk store.
#[derive(Clone)]
pub struct KeywordSearcher {
    index: Arc<dyn LexicalIndex>,
    store: Arc<dyn ChunkStore>,
}

impl KeywordSearcher {
    pub fn new(index: Arc<dyn LexicalIndex>, store: Arc<dyn ChunkStore>) -> Self {
        Self { index, store }
    }

    /// Up to `top_k` items ordered by descending lexical score.
    ///
    /// Hits scoring `<= 0` are dropped, as are ids the chunk store does not
    /// know (the two indexes were built out of step).
    pub async fn search(&self, query: &str, top_k: usize) -> Result<RankedList, RetrievalError> {
        let tokens = analyze(query);
        if tokens.is_empty() || top_k == 0 {
            debug!(top_k, "Query has no searchable terms");
            return Ok(RankedList::default());
        }

        let hits: Vec<_> = self
            .index
            .search(&tokens, top_k)
            .await?
            .into_iter()
            .filter(|hit| hit.score > 0.0)
            .collect();
        if hits.is_empty() {
            return Ok(RankedList::default());
        }

        let ids: Vec<String> = hits.iter().map(|h| h.chunk_id.clone()).collect();
        let mut stored: HashMap<String, _> = self
            .store
            .get(&ids)
            .await?
            .into_iter()
            .map(|chunk| (chunk.chunk_id.clone(), chunk))
            .collect();

        let mut items = Vec::with_capacity(hits.len());
        for hit in hits {
            match stored.remove(&hit.chunk_id) {
                Some(chunk) => items.push(RetrievedItem {
                    chunk_id: hit.chunk_id,
                    text: chunk.text,
                    metadata: chunk.metadata,
                    score: Score::Lexical(hit.score),
                }),
                None => warn!(
                    chunk_id = %hit.chunk_id,
                    "Lexical hit missing from chunk store, dropping"
                ),
            }
        }
        items.sort_by(|a, b| b.score.value().total_cmp(&a.score.value()));

        debug!(
            tokens = tokens.len(),
            kept = items.len(),
            "Keyword search complete"
        );
        Ok(RankedList::from_ranked(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{LexicalHit, StoredChunk};
    use crate::retrieval::types::ChunkMetadata;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records the tokens it was asked for and replays canned hits.
    struct CannedLexical {
        hits: Vec<(&'static str, f32)>,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LexicalIndex for CannedLexical {
        async fn search(&self, tokens: &[String], k: usize) -> Result<Vec<LexicalHit>, RetrievalError> {
            self.seen.lock().unwrap().extend(tokens.iter().cloned());
            Ok(self
                .hits
                .iter()
                .take(k)
                .map(|(id, score)| LexicalHit {
                    chunk_id: id.to_string(),
                    score: *score,
                })
                .collect())
        }
    }

    struct MapStore(Vec<&'static str>);

    #[async_trait]
    impl ChunkStore for MapStore {
        async fn get(&self, ids: &[String]) -> Result<Vec<StoredChunk>, RetrievalError> {
            Ok(ids
                .iter()
                .filter(|id| self.0.iter().any(|known| *known == id.as_str()))
                .map(|id| StoredChunk {
                    chunk_id: id.clone(),
                    text: format!("body {id}"),
                    metadata: ChunkMetadata {
                        repo_name: Some("primer".into()),
                        ..Default::default()
                    },
                })
                .collect())
        }
    }

    fn searcher(hits: Vec<(&'static str, f32)>, known: Vec<&'static str>) -> (KeywordSearcher, Arc<CannedLexical>) {
        let lexical = Arc::new(CannedLexical {
            hits,
            seen: Mutex::new(Vec::new()),
        });
        (
            KeywordSearcher::new(lexical.clone(), Arc::new(MapStore(known))),
            lexical,
        )
    }

    #[tokio::test]
    async fn test_query_uses_index_analyzer() {
        let (s, lexical) = searcher(vec![], vec![]);
        s.search("The Caching of Databases", 5).await.unwrap();
        let seen = lexical.seen.lock().unwrap().clone();
        assert_eq!(seen, analyze("The Caching of Databases"));
        assert!(!seen.contains(&"the".to_string()));
    }

    #[tokio::test]
    async fn test_hydrates_from_store_in_score_order() {
        let (s, _) = searcher(vec![("x", 4.0), ("y", 2.5)], vec!["x", "y"]);
        let list = s.search("sharding", 5).await.unwrap();
        let ids: Vec<&str> = list.items().iter().map(|i| i.chunk_id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert_eq!(list.items()[0].text, "body x");
        assert_eq!(list.items()[0].metadata.title(), "primer");
        assert_eq!(list.items()[1].score, Score::Lexical(2.5));
    }

    #[tokio::test]
    async fn test_unknown_ids_dropped() {
        let (s, _) = searcher(vec![("ghost", 9.0), ("real", 1.0)], vec!["real"]);
        let list = s.search("sharding", 5).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.items()[0].chunk_id, "real");
    }

    #[tokio::test]
    async fn test_non_positive_scores_dropped() {
        let (s, _) = searcher(vec![("a", 1.0), ("b", 0.0)], vec!["a", "b"]);
        let list = s.search("sharding", 5).await.unwrap();
        assert_eq!(list.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_word_query_skips_index() {
        let (s, lexical) = searcher(vec![("a", 1.0)], vec!["a"]);
        let list = s.search("the of and", 5).await.unwrap();
        assert!(list.is_empty());
        assert!(lexical.seen.lock().unwrap().is_empty());
    }
}
