//! SQLite chunk store.
//!
//! One table holds each chunk's text, JSON metadata and embedding (a
//! little-endian `f32` blob); `store_meta` records which embedding model
//! produced the vectors. The store answers id lookups ([`ChunkStore`]) and
//! brute-force cosine nearest-neighbour queries ([`VectorIndex`]).
//!
//! A connection is opened per operation inside `spawn_blocking`, so the store
//! is cheap to clone and never blocks the async runtime.

use super::{ChunkStore, StoredChunk, VectorHit, VectorIndex};
use crate::embeddings::cosine_similarity;
use crate::error::RetrievalError;
use crate::retrieval::types::{ChunkMetadata, MetadataFilter};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS chunks (
    id        TEXT PRIMARY KEY,
    text      TEXT NOT NULL,
    metadata  TEXT NOT NULL DEFAULT '{}',
    embedding BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS store_meta (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const EMBEDDING_MODEL_KEY: &str = "embedding_model";

fn storage_error(context: &str, e: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::Storage {
        message: format!("{context}: {e}"),
    }
}

fn connect(path: &Path) -> Result<Connection, RetrievalError> {
    let conn = Connection::open(path)
        .map_err(|e| storage_error(&format!("failed to open {}", path.display()), e))?;
    conn.execute_batch(SCHEMA)?;
    Ok(conn)
}

fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn parse_metadata(raw: &str) -> Result<ChunkMetadata, RetrievalError> {
    serde_json::from_str(raw).map_err(|e| storage_error("corrupt chunk metadata", e))
}

fn read_model_id(conn: &Connection) -> Result<Option<String>, RetrievalError> {
    Ok(conn
        .query_row(
            "SELECT value FROM store_meta WHERE key = ?1",
            params![EMBEDDING_MODEL_KEY],
            |row| row.get::<_, String>(0),
        )
        .optional()?)
}

/// Chunk text, metadata and embeddings in one SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteChunkStore {
    path: PathBuf,
    model_id: String,
}

impl SqliteChunkStore {
    /// Open (or create) the store for vectors produced by `model_id`.
    ///
    /// Fails with [`RetrievalError::EmbeddingModelMismatch`] when the store
    /// already holds vectors from a different model.
    pub fn open(path: &Path, model_id: &str) -> Result<Self, RetrievalError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| storage_error("failed to create data directory", e))?;
        }
        let conn = connect(path)?;
        if let Some(indexed) = read_model_id(&conn)?
            && indexed != model_id
        {
            return Err(RetrievalError::EmbeddingModelMismatch {
                indexed,
                configured: model_id.to_string(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
            model_id: model_id.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace chunks with their embeddings in one transaction.
    pub async fn upsert(
        &self,
        chunks: &[StoredChunk],
        embeddings: &[Vec<f32>],
    ) -> Result<usize, RetrievalError> {
        if chunks.len() != embeddings.len() {
            return Err(storage_error(
                "upsert",
                format!("{} chunks but {} embeddings", chunks.len(), embeddings.len()),
            ));
        }
        let rows: Vec<(String, String, String, Vec<u8>)> = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| -> Result<_, RetrievalError> {
                let metadata = serde_json::to_string(&chunk.metadata)
                    .map_err(|e| storage_error("failed to encode metadata", e))?;
                Ok((
                    chunk.chunk_id.clone(),
                    chunk.text.clone(),
                    metadata,
                    encode_embedding(embedding),
                ))
            })
            .collect::<Result<_, _>>()?;
        let path = self.path.clone();
        let model_id = self.model_id.clone();

        tokio::task::spawn_blocking(move || -> Result<usize, RetrievalError> {
            let mut conn = connect(&path)?;
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO store_meta (key, value) VALUES (?1, ?2)",
                params![EMBEDDING_MODEL_KEY, model_id],
            )?;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO chunks (id, text, metadata, embedding) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for (id, text, metadata, embedding) in &rows {
                    stmt.execute(params![id, text, metadata, embedding])?;
                }
            }
            tx.commit()?;
            debug!(count = rows.len(), "Committed chunk store batch");
            Ok(rows.len())
        })
        .await
        .map_err(|e| storage_error("storage task failed", e))?
    }

    /// Number of stored chunks.
    pub async fn count(&self) -> Result<usize, RetrievalError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<usize, RetrievalError> {
            let conn = connect(&path)?;
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
        .map_err(|e| storage_error("storage task failed", e))?
    }

    /// Model id recorded by the first write, if any.
    pub async fn indexed_model(&self) -> Result<Option<String>, RetrievalError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<Option<String>, RetrievalError> {
            read_model_id(&connect(&path)?)
        })
        .await
        .map_err(|e| storage_error("storage task failed", e))?
    }
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn get(&self, ids: &[String]) -> Result<Vec<StoredChunk>, RetrievalError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let path = self.path.clone();
        let ids = ids.to_vec();

        tokio::task::spawn_blocking(move || -> Result<Vec<StoredChunk>, RetrievalError> {
            let conn = connect(&path)?;
            let placeholders = vec!["?"; ids.len()].join(", ");
            let sql = format!("SELECT id, text, metadata FROM chunks WHERE id IN ({placeholders})");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut found: HashMap<String, (String, String)> = HashMap::new();
            for row in rows {
                let (id, text, metadata) = row?;
                found.insert(id, (text, metadata));
            }

            let mut chunks = Vec::with_capacity(found.len());
            for id in &ids {
                if let Some((text, metadata)) = found.get(id) {
                    chunks.push(StoredChunk {
                        chunk_id: id.clone(),
                        text: text.clone(),
                        metadata: parse_metadata(metadata)?,
                    });
                }
            }
            Ok(chunks)
        })
        .await
        .map_err(|e| storage_error("storage task failed", e))?
    }
}

#[async_trait]
impl VectorIndex for SqliteChunkStore {
    async fn query(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<VectorHit>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let path = self.path.clone();
        let query = vector.to_vec();
        let filter = filter.cloned();

        tokio::task::spawn_blocking(move || -> Result<Vec<VectorHit>, RetrievalError> {
            let conn = connect(&path)?;
            let mut stmt = conn.prepare("SELECT id, text, metadata, embedding FROM chunks")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })?;

            let mut hits = Vec::new();
            let mut skipped_dims = 0usize;
            for row in rows {
                let (chunk_id, text, raw_metadata, blob) = row?;
                let metadata = parse_metadata(&raw_metadata)?;
                if filter.as_ref().is_some_and(|f| !f.matches(&metadata)) {
                    continue;
                }
                let embedding = decode_embedding(&blob);
                if embedding.len() != query.len() {
                    skipped_dims += 1;
                    continue;
                }
                hits.push(VectorHit {
                    distance: 1.0 - cosine_similarity(&query, &embedding),
                    chunk_id,
                    text,
                    metadata,
                });
            }
            if skipped_dims > 0 {
                warn!(
                    skipped = skipped_dims,
                    expected = query.len(),
                    "Skipped stored vectors with unexpected dimensions"
                );
            }

            hits.sort_by(|a, b| {
                a.distance
                    .total_cmp(&b.distance)
                    .then_with(|| a.chunk_id.cmp(&b.chunk_id))
            });
            hits.truncate(k);
            Ok(hits)
        })
        .await
        .map_err(|e| storage_error("storage task failed", e))?
    }
}
