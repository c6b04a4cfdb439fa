//! Retrieval: two independent search paths merged by reciprocal rank fusion.
//!
//! ```text
//! query ─┬─ SemanticSearcher (embed → vector index → similarity floor) ─┐
//!        └─ KeywordSearcher  (analyze → lexical index → chunk store) ───┴─ FusionEngine → top_k
//! ```

pub mod fusion;
pub mod hybrid;
pub mod keyword;
pub mod semantic;
pub mod types;

pub use fusion::{FusionConfig, FusionEngine};
pub use hybrid::{HybridRetriever, RetrievalOutcome};
pub use keyword::KeywordSearcher;
pub use semantic::SemanticSearcher;
pub use types::{
    ChunkMetadata, Citable, FusedResult, MetadataFilter, RankedList, RetrievedItem, Score,
};
