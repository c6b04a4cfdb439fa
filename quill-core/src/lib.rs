//! # Quill Core
//!
//! Core library for Quill, a grounded question-answering engine.
//! Provides hybrid lexical + semantic retrieval fused by reciprocal rank,
//! numbered context assembly, primary/backup inference failover, citation
//! validation, and the index collaborators that back them.

pub mod brain;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod index;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{LlmProvider, MockLlmProvider};
pub use config::{
    GenerationConfig, IndexConfig, ProviderConfig, QuillConfig, RetrievalConfig, load_config,
};
pub use embeddings::{Embedder, EmbeddingConfig, create_embedder};
pub use error::{ConfigError, ErrorClass, LlmError, QuillError, Result, RetrievalError};
pub use generation::{CitationExtractor, ContextAssembler, SourceMap, SourceRef};
pub use index::{IndexReport, Indexer, SqliteChunkStore, StoredChunk, TantivyLexicalIndex};
pub use pipeline::{AnswerPipeline, AnswerRequest, GenerationResult, GenerationStatus};
pub use providers::{FailoverGenerator, OpenAiCompatibleProvider, build_generator};
pub use retrieval::{
    FusedResult, FusionConfig, FusionEngine, HybridRetriever, KeywordSearcher, MetadataFilter,
    RankedList, RetrievalOutcome, RetrievedItem, SemanticSearcher,
};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
