//! Tantivy-backed lexical index.
//!
//! Chunk bodies are indexed (not stored) with the `quill_en` analyzer; only
//! the chunk id is stored. Query text must go through [`analyze`], which
//! builds the very same analyzer, so indexing and querying tokenize
//! identically.

use super::{LexicalHit, LexicalIndex, StoredChunk};
use crate::error::RetrievalError;
use async_trait::async_trait;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::directory::MmapDirectory;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::*;
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, StopWordFilter,
    TextAnalyzer, TokenStream,
};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Term, doc};
use tracing::debug;

/// Name the analyzer is registered under in the index schema.
pub const ANALYZER_NAME: &str = "quill_en";

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Case folding, English stop-word removal and stemming.
pub fn quill_analyzer() -> TextAnalyzer {
    let stop_words = StopWordFilter::new(Language::English)
        .unwrap_or_else(|| StopWordFilter::remove(Vec::<String>::new()));
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(stop_words)
        .filter(Stemmer::new(Language::English))
        .build()
}

/// Tokenize `text` exactly as chunk bodies are tokenized at index time.
pub fn analyze(text: &str) -> Vec<String> {
    let mut analyzer = quill_analyzer();
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        tokens.push(stream.token().text.clone());
    }
    tokens
}

fn lexical_error(context: &str, e: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::LexicalIndex {
        message: format!("{context}: {e}"),
    }
}

/// BM25 search over chunk bodies.
#[derive(Clone)]
pub struct TantivyLexicalIndex {
    index: Index,
    reader: IndexReader,
    chunk_id_field: Field,
    body_field: Field,
}

impl std::fmt::Debug for TantivyLexicalIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TantivyLexicalIndex")
            .field("num_docs", &self.num_docs())
            .finish()
    }
}

fn build_schema() -> (Schema, Field, Field) {
    let mut schema_builder = Schema::builder();
    let chunk_id_field = schema_builder.add_text_field("chunk_id", STRING | STORED);
    let body_indexing = TextFieldIndexing::default()
        .set_tokenizer(ANALYZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let body_field = schema_builder.add_text_field(
        "body",
        TextOptions::default().set_indexing_options(body_indexing),
    );
    (schema_builder.build(), chunk_id_field, body_field)
}

impl TantivyLexicalIndex {
    /// Open the index at `path`, creating it if the directory is empty.
    pub fn open(path: &Path) -> Result<Self, RetrievalError> {
        std::fs::create_dir_all(path)
            .map_err(|e| lexical_error("failed to create index directory", e))?;
        let directory =
            MmapDirectory::open(path).map_err(|e| lexical_error("failed to open directory", e))?;
        let (schema, _, _) = build_schema();
        let index = Index::open_or_create(directory, schema)?;
        Self::from_index(index)
    }

    /// A throwaway index held in memory.
    pub fn in_memory() -> Result<Self, RetrievalError> {
        let (schema, _, _) = build_schema();
        Self::from_index(Index::create_in_ram(schema))
    }

    fn from_index(index: Index) -> Result<Self, RetrievalError> {
        index.tokenizers().register(ANALYZER_NAME, quill_analyzer());
        let schema = index.schema();
        let chunk_id_field = schema.get_field("chunk_id")?;
        let body_field = schema.get_field("body")?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        Ok(Self {
            index,
            reader,
            chunk_id_field,
            body_field,
        })
    }

    /// Number of indexed chunks visible to searches.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Insert or replace chunk bodies, keyed by chunk id, and commit.
    ///
    /// The writer lock is held only for the duration of this call so a
    /// query-only process can keep the index open alongside.
    pub async fn upsert(&self, chunks: &[StoredChunk]) -> Result<usize, RetrievalError> {
        let this = self.clone();
        let docs: Vec<(String, String)> = chunks
            .iter()
            .map(|c| (c.chunk_id.clone(), c.text.clone()))
            .collect();
        tokio::task::spawn_blocking(move || this.upsert_blocking(docs))
            .await
            .map_err(|e| lexical_error("index task failed", e))?
    }

    fn upsert_blocking(&self, docs: Vec<(String, String)>) -> Result<usize, RetrievalError> {
        let mut writer: IndexWriter = self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?;
        let count = docs.len();
        for (chunk_id, body) in docs {
            writer.delete_term(Term::from_field_text(self.chunk_id_field, &chunk_id));
            writer.add_document(doc!(
                self.chunk_id_field => chunk_id,
                self.body_field => body,
            ))?;
        }
        writer.commit()?;
        self.reader.reload()?;
        debug!(count, "Committed lexical index batch");
        Ok(count)
    }

    fn search_blocking(&self, tokens: &[String], k: usize) -> Result<Vec<LexicalHit>, RetrievalError> {
        // One clause per token, repeats included, so query term frequency
        // adds weight the same way it does in the BM25 sum.
        let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
            .iter()
            .map(|token| {
                let term = Term::from_field_text(self.body_field, token);
                let query: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, query)
            })
            .collect();
        if clauses.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let query = BooleanQuery::new(clauses);
        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&query, &TopDocs::with_limit(k))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc: TantivyDocument = searcher.doc(address)?;
            if let Some(chunk_id) = doc.get_first(self.chunk_id_field).and_then(|v| v.as_str()) {
                hits.push(LexicalHit {
                    chunk_id: chunk_id.to_string(),
                    score,
                });
            }
        }
        Ok(hits)
    }
}

#[async_trait]
impl LexicalIndex for TantivyLexicalIndex {
    async fn search(&self, tokens: &[String], k: usize) -> Result<Vec<LexicalHit>, RetrievalError> {
        let this = self.clone();
        let tokens = tokens.to_vec();
        tokio::task::spawn_blocking(move || this.search_blocking(&tokens, k))
            .await
            .map_err(|e| lexical_error("search task failed", e))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::types::ChunkMetadata;

    fn chunk(id: &str, text: &str) -> StoredChunk {
        StoredChunk {
            chunk_id: id.to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata::default(),
        }
    }

    async fn sample_index() -> TantivyLexicalIndex {
        let index = TantivyLexicalIndex::in_memory().unwrap();
        index
            .upsert(&[
                chunk("redis-1", "Redis is an in-memory cache used for read-heavy workloads."),
                chunk("kafka-1", "Kafka partitions a topic across brokers for throughput."),
                chunk("cap-1", "The CAP theorem: consistency, availability, partition tolerance."),
            ])
            .await
            .unwrap();
        index
    }

    #[test]
    fn test_analyze_folds_case_and_drops_stop_words() {
        assert_eq!(analyze("The Running"), vec!["run".to_string()]);
        assert!(analyze("the and of").is_empty());
        assert!(analyze("").is_empty());
    }

    #[test]
    fn test_analyze_stems_variants_together() {
        assert_eq!(analyze("caching"), analyze("cache"));
    }

    #[tokio::test]
    async fn test_search_finds_stemmed_match() {
        let index = sample_index().await;
        assert_eq!(index.num_docs(), 3);

        let hits = index.search(&analyze("caching"), 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "redis-1");
        assert!(hits[0].score > 0.0);
    }

    #[tokio::test]
    async fn test_search_orders_by_score() {
        let index = sample_index().await;
        let hits = index.search(&analyze("partition partitions brokers"), 5).await.unwrap();
        assert_eq!(hits[0].chunk_id, "kafka-1");
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_repeated_query_terms_add_weight() {
        let index = sample_index().await;
        let once = index.search(&analyze("cache"), 5).await.unwrap();
        let twice = index.search(&analyze("cache cache"), 5).await.unwrap();
        assert_eq!(twice[0].chunk_id, "redis-1");
        assert!((twice[0].score - 2.0 * once[0].score).abs() < 1e-4 * once[0].score.max(1.0));
    }

    #[tokio::test]
    async fn test_search_without_tokens_is_empty() {
        let index = sample_index().await;
        assert!(index.search(&[], 5).await.unwrap().is_empty());
        assert!(index.search(&analyze("the of and"), 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_chunk() {
        let index = sample_index().await;
        index
            .upsert(&[chunk("redis-1", "Memcached slabs and eviction.")])
            .await
            .unwrap();
        assert_eq!(index.num_docs(), 3);
        assert!(index.search(&analyze("redis"), 5).await.unwrap().is_empty());
        let hits = index.search(&analyze("memcached"), 5).await.unwrap();
        assert_eq!(hits[0].chunk_id, "redis-1");
    }

    #[tokio::test]
    async fn test_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = TantivyLexicalIndex::open(dir.path()).unwrap();
            index
                .upsert(&[chunk("bloom-1", "Bloom filters trade false positives for space.")])
                .await
                .unwrap();
        }
        let reopened = TantivyLexicalIndex::open(dir.path()).unwrap();
        let hits = reopened.search(&analyze("bloom filter"), 3).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "bloom-1");
    }
}
