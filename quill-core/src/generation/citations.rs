//! Citation marker extraction and validation.
//!
//! The model is asked to cite `[n]` for the numbered context blocks. Markers
//! are collected, deduplicated and sorted; numbers without a matching source
//! (the model inventing `[7]` for five sources) are dropped without error.

use super::context::{SourceMap, SourceRef};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use tracing::debug;

static CITATION_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(\d+)\]").expect("citation marker pattern is valid"));

#[derive(Debug, Clone, Copy, Default)]
pub struct CitationExtractor;

impl CitationExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Every distinct `[n]` number in `answer`, ascending.
    ///
    /// Numbers too large for `usize` cannot name a source and are skipped.
    pub fn extract_ids(&self, answer: &str) -> Vec<usize> {
        CITATION_MARKER
            .captures_iter(answer)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<usize>().ok())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Sources cited in `answer`, in citation-number order.
    pub fn cited_sources(&self, answer: &str, sources: &SourceMap) -> Vec<SourceRef> {
        let ids = self.extract_ids(answer);
        let cited: Vec<SourceRef> = ids
            .iter()
            .filter_map(|id| sources.get(id).cloned())
            .collect();
        debug!(
            markers = ids.len(),
            valid = cited.len(),
            "Extracted citations"
        );
        cited
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn source_map(n: usize) -> SourceMap {
        (1..=n)
            .map(|i| {
                (
                    i,
                    SourceRef {
                        source_url: Some(format!("https://example.com/{i}")),
                        title: format!("Source {i}"),
                        section: String::new(),
                        chunk_id: format!("chunk-{i}"),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_extract_dedupes_and_sorts() {
        let extractor = CitationExtractor::new();
        assert_eq!(extractor.extract_ids("CAP theorem [1][3] and BASE [1]"), vec![1, 3]);
        assert_eq!(extractor.extract_ids("Redis [10] provides [2] caching"), vec![2, 10]);
        assert!(extractor.extract_ids("No citations here").is_empty());
    }

    #[test]
    fn test_ignores_non_numeric_brackets() {
        let extractor = CitationExtractor::new();
        assert_eq!(
            extractor.extract_ids("see [a] and [ 2 ] and [2b] and [4] and [[5]]"),
            vec![4, 5]
        );
    }

    #[test]
    fn test_overflowing_marker_skipped() {
        let extractor = CitationExtractor::new();
        let answer = "huge [99999999999999999999999999] then [1]";
        assert_eq!(extractor.extract_ids(answer), vec![1]);
    }

    #[test]
    fn test_unknown_ids_dropped_silently() {
        let extractor = CitationExtractor::new();
        let cited = extractor.cited_sources("Redis [10] provides [2] caching", &source_map(5));
        assert_eq!(cited.len(), 1);
        assert_eq!(cited[0].chunk_id, "chunk-2");
    }

    #[test]
    fn test_order_is_by_number_not_appearance() {
        let extractor = CitationExtractor::new();
        let cited = extractor.cited_sources("first [3], then [1], then [2]", &source_map(3));
        let chunk_ids: Vec<&str> = cited.iter().map(|s| s.chunk_id.as_str()).collect();
        assert_eq!(chunk_ids, vec!["chunk-1", "chunk-2", "chunk-3"]);
    }

    #[test]
    fn test_zero_is_never_a_source() {
        let extractor = CitationExtractor::new();
        assert!(extractor.cited_sources("[0]", &source_map(3)).is_empty());
    }
}
