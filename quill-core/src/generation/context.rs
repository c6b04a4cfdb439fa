//! Numbered context assembly.
//!
//! Each retrieved chunk becomes a `[n] <text>` block. The same numbers key
//! the [`SourceMap`], so a marker in the answer resolves back to its chunk.

use crate::retrieval::Citable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a cited passage came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_url: Option<String>,
    pub title: String,
    pub section: String,
    pub chunk_id: String,
}

impl SourceRef {
    pub fn from_citable(item: &(impl Citable + ?Sized)) -> Self {
        let metadata = item.metadata();
        Self {
            source_url: metadata.source_url.clone(),
            title: metadata.title().to_string(),
            section: metadata.section().to_string(),
            chunk_id: item.chunk_id().to_string(),
        }
    }
}

/// Citation number (1-based, contiguous) to source. Number 1 is the
/// top-ranked chunk.
pub type SourceMap = BTreeMap<usize, SourceRef>;

/// Separator between context blocks.
const BLOCK_SEPARATOR: &str = "\n\n";

/// Builds the prompt context and its source map from ranked results.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Number `items` in the given order. Empty input gives `("", {})`.
    pub fn assemble<C: Citable + ?Sized>(&self, items: &[&C]) -> (String, SourceMap) {
        let mut blocks = Vec::with_capacity(items.len());
        let mut sources = SourceMap::new();
        for (idx, item) in items.iter().enumerate() {
            let number = idx + 1;
            blocks.push(format!("[{number}] {}", item.text()));
            sources.insert(number, SourceRef::from_citable(*item));
        }
        (blocks.join(BLOCK_SEPARATOR), sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::{ChunkMetadata, Citable, RetrievedItem, Score};
    use pretty_assertions::assert_eq;

    fn item(id: &str, text: &str, metadata: serde_json::Value) -> RetrievedItem {
        RetrievedItem {
            chunk_id: id.to_string(),
            text: text.to_string(),
            metadata: serde_json::from_value(metadata).unwrap(),
            score: Score::Similarity(0.8),
        }
    }

    #[test]
    fn test_empty_input() {
        let items: Vec<&RetrievedItem> = Vec::new();
        let (context, sources) = ContextAssembler::new().assemble(&items);
        assert_eq!(context, "");
        assert!(sources.is_empty());
    }

    #[test]
    fn test_numbering_follows_rank_order() {
        let first = item(
            "abc123",
            "CAP theorem states...",
            serde_json::json!({
                "source_url": "https://github.com/donnemartin/system-design-primer",
                "source_title": "System Design Primer",
                "section_header": "Database Theory"
            }),
        );
        let second = item("def456", "Sharding splits data.", serde_json::json!({ "repo_name": "primer" }));
        let (context, sources) = ContextAssembler::new().assemble(&[&first, &second]);

        assert_eq!(context, "[1] CAP theorem states...\n\n[2] Sharding splits data.");
        assert_eq!(sources.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(
            sources[&1],
            SourceRef {
                source_url: Some("https://github.com/donnemartin/system-design-primer".into()),
                title: "System Design Primer".into(),
                section: "Database Theory".into(),
                chunk_id: "abc123".into(),
            }
        );
        assert_eq!(sources[&2].title, "primer");
        assert_eq!(sources[&2].section, "");
        assert_eq!(sources[&2].source_url, None);
    }

    #[test]
    fn test_missing_metadata_uses_fallbacks() {
        let bare = RetrievedItem {
            chunk_id: "x".into(),
            text: "t".into(),
            metadata: ChunkMetadata::default(),
            score: Score::Lexical(1.0),
        };
        let (_, sources) = ContextAssembler::new().assemble(&[&bare]);
        assert_eq!(sources[&1].title, "Unknown Source");
        assert_eq!(sources[&1].section, "");
    }

    #[test]
    fn test_accepts_trait_objects() {
        let a = item("a", "alpha", serde_json::json!({}));
        let items: Vec<&dyn Citable> = vec![&a];
        let (context, sources) = ContextAssembler::new().assemble(&items);
        assert_eq!(context, "[1] alpha");
        assert_eq!(sources[&1].chunk_id, "a");
    }
}
