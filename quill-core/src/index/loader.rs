//! Loads pre-chunked records into the chunk store and the lexical index.
//!
//! Input is JSON Lines, one `{"chunk_id", "text", "metadata"}` object per
//! line. Fetching, parsing and chunking source documents happens upstream.

use super::{SqliteChunkStore, StoredChunk, TantivyLexicalIndex};
use crate::embeddings::Embedder;
use crate::error::{QuillError, RetrievalError};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

const DEFAULT_BATCH_SIZE: usize = 32;

/// Summary of one indexing run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub indexed: usize,
    /// Lines that were blank, unparsable, or had empty text.
    pub skipped: usize,
}

/// Embeds chunks and writes them to both stores.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    store: SqliteChunkStore,
    lexical: TantivyLexicalIndex,
    batch_size: usize,
}

impl Indexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: SqliteChunkStore,
        lexical: TantivyLexicalIndex,
    ) -> Self {
        Self {
            embedder,
            store,
            lexical,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Index every record in a JSON Lines file.
    pub async fn index_jsonl(&self, path: &Path) -> Result<IndexReport, QuillError> {
        let file = tokio::fs::File::open(path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut report = IndexReport::default();
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut line_no = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StoredChunk>(&line) {
                Ok(chunk) if !chunk.text.trim().is_empty() && !chunk.chunk_id.is_empty() => {
                    batch.push(chunk);
                }
                Ok(_) => {
                    warn!(line = line_no, "Skipping record with empty chunk_id or text");
                    report.skipped += 1;
                }
                Err(e) => {
                    warn!(line = line_no, error = %e, "Skipping unparsable record");
                    report.skipped += 1;
                }
            }
            if batch.len() >= self.batch_size {
                report.indexed += self.index_batch(&batch).await?;
                batch.clear();
            }
        }
        if !batch.is_empty() {
            report.indexed += self.index_batch(&batch).await?;
        }

        info!(
            indexed = report.indexed,
            skipped = report.skipped,
            path = %path.display(),
            "Indexing complete"
        );
        Ok(report)
    }

    /// Embed and write one batch of chunks.
    pub async fn index_batch(&self, chunks: &[StoredChunk]) -> Result<usize, RetrievalError> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        self.store.upsert(chunks, &embeddings).await?;
        self.lexical.upsert(chunks).await?;
        Ok(chunks.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::LocalEmbedder;
    use crate::index::{ChunkStore, LexicalIndex, VectorIndex, analyze};

    #[tokio::test]
    async fn test_index_jsonl_populates_both_stores() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("chunks.jsonl");
        std::fs::write(
            &input,
            concat!(
                r#"{"chunk_id":"c1","text":"Consistent hashing spreads keys across nodes.","metadata":{"source_title":"Primer"}}"#,
                "\n\n",
                r#"{"chunk_id":"c2","text":"Write-ahead logs make crashes recoverable.","metadata":{}}"#,
                "\n",
                "not json\n",
                r#"{"chunk_id":"c3","text":"   "}"#,
                "\n",
            ),
        )
        .unwrap();

        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(64));
        let store = SqliteChunkStore::open(&dir.path().join("chunks.db"), &embedder.model_id()).unwrap();
        let lexical = TantivyLexicalIndex::in_memory().unwrap();
        let indexer = Indexer::new(embedder.clone(), store.clone(), lexical.clone()).with_batch_size(1);

        let report = indexer.index_jsonl(&input).await.unwrap();
        assert_eq!(report, IndexReport { indexed: 2, skipped: 2 });
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(lexical.num_docs(), 2);

        let hits = lexical.search(&analyze("hashing"), 5).await.unwrap();
        assert_eq!(hits[0].chunk_id, "c1");

        let query = embedder.embed("write-ahead logs").await.unwrap();
        let nearest = store.query(&query, 1, None).await.unwrap();
        assert_eq!(nearest[0].chunk_id, "c2");

        let stored = store.get(&["c1".to_string()]).await.unwrap();
        assert_eq!(stored[0].metadata.title(), "Primer");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(LocalEmbedder::new(8));
        let store = SqliteChunkStore::open(&dir.path().join("chunks.db"), &embedder.model_id()).unwrap();
        let indexer = Indexer::new(embedder, store, TantivyLexicalIndex::in_memory().unwrap());
        let result = indexer.index_jsonl(&dir.path().join("absent.jsonl")).await;
        assert!(matches!(result, Err(QuillError::Io(_))));
    }
}
