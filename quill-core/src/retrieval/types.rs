//! Typed records passed between retrieval, fusion and context assembly.

use serde::{Deserialize, Serialize};

/// Metadata attached to every chunk.
///
/// Known keys are typed; anything else written at index time survives in
/// `extra` so it can still be used by [`MetadataFilter`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_header: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    /// Comma-joined category labels, e.g. `"caching,databases"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_categories: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub const UNKNOWN_SOURCE: &str = "Unknown Source";

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl ChunkMetadata {
    /// Display title: `source_title`, then `repo_name`, then `"Unknown Source"`.
    pub fn title(&self) -> &str {
        present(&self.source_title)
            .or_else(|| present(&self.repo_name))
            .unwrap_or(UNKNOWN_SOURCE)
    }

    /// Section label: `section_heading`, then `section_header`, then `""`.
    pub fn section(&self) -> &str {
        present(&self.section_heading)
            .or_else(|| present(&self.section_header))
            .unwrap_or("")
    }

    /// Look up a field by its metadata key, as a string.
    pub fn field(&self, name: &str) -> Option<String> {
        let typed = match name {
            "source_url" => &self.source_url,
            "source_title" => &self.source_title,
            "repo_name" => &self.repo_name,
            "section_heading" => &self.section_heading,
            "section_header" => &self.section_header,
            "source_type" => &self.source_type,
            "topic_categories" => &self.topic_categories,
            _ => {
                return self.extra.get(name).and_then(|v| match v {
                    serde_json::Value::String(s) => Some(s.clone()),
                    serde_json::Value::Null => None,
                    other => Some(other.to_string()),
                });
            }
        };
        typed.clone()
    }
}

/// Predicate over chunk metadata, applied by the vector index before ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MetadataFilter {
    Eq { field: String, value: String },
    In { field: String, values: Vec<String> },
    /// Substring match, e.g. one label inside comma-joined `topic_categories`.
    Contains { field: String, needle: String },
    And { all: Vec<MetadataFilter> },
}

impl MetadataFilter {
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        MetadataFilter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn contains(field: impl Into<String>, needle: impl Into<String>) -> Self {
        MetadataFilter::Contains {
            field: field.into(),
            needle: needle.into(),
        }
    }

    /// Combine optional filters. Returns `None` when nothing is set and the
    /// single filter unchanged when only one is.
    pub fn all_of(filters: Vec<MetadataFilter>) -> Option<MetadataFilter> {
        let mut filters = filters;
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(MetadataFilter::And { all: filters }),
        }
    }

    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        match self {
            MetadataFilter::Eq { field, value } => {
                metadata.field(field).as_deref() == Some(value.as_str())
            }
            MetadataFilter::In { field, values } => metadata
                .field(field)
                .is_some_and(|v| values.iter().any(|candidate| *candidate == v)),
            MetadataFilter::Contains { field, needle } => metadata
                .field(field)
                .is_some_and(|v| v.contains(needle.as_str())),
            MetadataFilter::And { all } => all.iter().all(|f| f.matches(metadata)),
        }
    }
}

/// The raw score a search path assigned to an item. The two scales are not
/// comparable with each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    /// BM25 relevance from the lexical index.
    Lexical(f32),
    /// `1 - cosine distance`; may be negative.
    Similarity(f32),
}

impl Score {
    pub fn value(&self) -> f32 {
        match self {
            Score::Lexical(v) | Score::Similarity(v) => *v,
        }
    }
}

/// One hit from a single search path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedItem {
    pub chunk_id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub score: Score,
}

/// Hits from one search path, best first. Rank is the 1-based position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankedList {
    items: Vec<RetrievedItem>,
}

impl RankedList {
    /// Wrap items that are already in rank order.
    pub fn from_ranked(items: Vec<RetrievedItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[RetrievedItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<RetrievedItem> {
        self.items
    }

    /// `(rank, item)` pairs with rank starting at 1.
    pub fn ranked(&self) -> impl Iterator<Item = (usize, &RetrievedItem)> {
        self.items.iter().enumerate().map(|(i, item)| (i + 1, item))
    }

    /// Drop items failing `keep`. Survivors keep their relative order.
    pub fn retain(&mut self, keep: impl FnMut(&RetrievedItem) -> bool) {
        self.items.retain(keep);
    }
}

/// A chunk after reciprocal rank fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub chunk_id: String,
    /// Derived from rank positions only.
    pub fusion_score: f64,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub lexical_score: Option<f32>,
    pub similarity_score: Option<f32>,
}

/// Anything the context assembler can number and cite.
pub trait Citable {
    fn chunk_id(&self) -> &str;
    fn text(&self) -> &str;
    fn metadata(&self) -> &ChunkMetadata;
}

impl Citable for RetrievedItem {
    fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }
}

impl Citable for FusedResult {
    fn chunk_id(&self) -> &str {
        &self.chunk_id
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }
}
