//! Index collaborators consumed by the retrieval layer.
//!
//! The searchers depend only on the traits here. Concrete backends:
//! - [`sqlite::SqliteChunkStore`]: chunk text, metadata and embeddings in
//!   SQLite; serves both [`ChunkStore`] and [`VectorIndex`].
//! - [`lexical::TantivyLexicalIndex`]: BM25 over chunk bodies, ids only.
//!
//! [`loader::Indexer`] populates both from pre-chunked JSON Lines.

pub mod lexical;
pub mod loader;
pub mod sqlite;

use crate::error::RetrievalError;
use crate::retrieval::types::{ChunkMetadata, MetadataFilter};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use lexical::{TantivyLexicalIndex, analyze};
pub use loader::{IndexReport, Indexer};
pub use sqlite::SqliteChunkStore;

/// A chunk as written to and read from storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    #[serde(alias = "id")]
    pub chunk_id: String,
    pub text: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

/// Nearest-neighbour hit from a [`VectorIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk_id: String,
    /// Cosine distance, `1 - cosine_similarity`.
    pub distance: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Scored id from a [`LexicalIndex`].
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub score: f32,
}

/// Dense-vector nearest-neighbour search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `k` hits ordered by ascending distance. `filter` is applied
    /// before ranking.
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>, RetrievalError>;
}

/// Term-based relevance search. Stores no text.
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    /// Up to `k` hits ordered by descending score. `tokens` are already
    /// analyzed with [`analyze`].
    async fn search(&self, tokens: &[String], k: usize) -> Result<Vec<LexicalHit>, RetrievalError>;
}

/// Lookup of chunk text and metadata by id.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Chunks for `ids` in request order. Unknown ids are skipped.
    async fn get(&self, ids: &[String]) -> Result<Vec<StoredChunk>, RetrievalError>;
}
