//! End-to-end question answering.
//!
//! ```text
//! RETRIEVING ─┬─ EMPTY ─────────────────────────────────────► no_context
//!             └─ READY ─► GENERATING ─┬─ LLM_FAILURE ──────► llm_error
//!                                     └─ ANSWER_READY ─► EXTRACTING ─► success
//! ```
//!
//! Every expected failure is folded into a [`GenerationStatus`]; `answer`
//! always returns a [`GenerationResult`].

use crate::config::RetrievalConfig;
use crate::generation::{CitationExtractor, ContextAssembler, SourceRef, build_messages};
use crate::providers::FailoverGenerator;
use crate::retrieval::{HybridRetriever, MetadataFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Answer text returned when retrieval finds nothing relevant.
pub const NO_CONTEXT_ANSWER: &str =
    "I don't have relevant information in my knowledge base to answer this question.";

/// How a pipeline call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Success,
    NoContext,
    LlmError,
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationStatus::Success => write!(f, "success"),
            GenerationStatus::NoContext => write!(f, "no_context"),
            GenerationStatus::LlmError => write!(f, "llm_error"),
        }
    }
}

/// The only value a pipeline call returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub answer: String,
    /// Cited sources in citation-number order. Empty unless `status` is
    /// `Success`.
    pub sources: Vec<SourceRef>,
    pub status: GenerationStatus,
    /// Chunks handed to generation, counted before the provider was called.
    pub num_chunks_retrieved: usize,
}

impl GenerationResult {
    pub fn no_context() -> Self {
        Self {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
            status: GenerationStatus::NoContext,
            num_chunks_retrieved: 0,
        }
    }

    pub fn llm_error(description: impl std::fmt::Display, num_chunks_retrieved: usize) -> Self {
        Self {
            answer: format!("Error generating answer: {description}"),
            sources: Vec::new(),
            status: GenerationStatus::LlmError,
            num_chunks_retrieved,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == GenerationStatus::Success
    }
}

/// One question plus optional per-call overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerRequest {
    pub query: String,
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub filter: Option<MetadataFilter>,
    /// `Some(false)` forces semantic-only retrieval.
    pub hybrid: Option<bool>,
}

impl AnswerRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn filter(mut self, filter: Option<MetadataFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn hybrid(mut self, hybrid: bool) -> Self {
        self.hybrid = Some(hybrid);
        self
    }
}

/// Retrieval, context assembly, generation and citation checking in one call.
///
/// Holds no per-query state, so one instance can serve concurrent queries.
pub struct AnswerPipeline {
    retriever: HybridRetriever,
    assembler: ContextAssembler,
    generator: FailoverGenerator,
    extractor: CitationExtractor,
    default_top_k: usize,
    default_min_similarity: f32,
}

impl AnswerPipeline {
    pub fn new(retriever: HybridRetriever, generator: FailoverGenerator) -> Self {
        let defaults = RetrievalConfig::default();
        Self {
            retriever,
            assembler: ContextAssembler::new(),
            generator,
            extractor: CitationExtractor::new(),
            default_top_k: defaults.top_k,
            default_min_similarity: defaults.min_similarity,
        }
    }

    /// Take `top_k` and `min_similarity` defaults from configuration.
    pub fn with_defaults(mut self, config: &RetrievalConfig) -> Self {
        self.default_top_k = config.top_k;
        self.default_min_similarity = config.min_similarity;
        self
    }

    pub fn generator(&self) -> &FailoverGenerator {
        &self.generator
    }

    pub fn retriever(&self) -> &HybridRetriever {
        &self.retriever
    }

    /// Answer `query` with the given retrieval parameters.
    pub async fn answer(&self, query: &str, top_k: usize, min_similarity: f32) -> GenerationResult {
        self.answer_with(&AnswerRequest::new(query).top_k(top_k).min_similarity(min_similarity))
            .await
    }

    /// Answer a request, using configured defaults for unset fields.
    pub async fn answer_with(&self, request: &AnswerRequest) -> GenerationResult {
        let query = request.query.trim();
        let top_k = request.top_k.unwrap_or(self.default_top_k);
        let min_similarity = request.min_similarity.unwrap_or(self.default_min_similarity);

        if query.is_empty() {
            debug!(stage = "EMPTY", "Empty query");
            return GenerationResult::no_context();
        }

        debug!(
            stage = "RETRIEVING",
            query_len = query.len(),
            top_k,
            min_similarity,
            filtered = request.filter.is_some(),
            "Retrieving context"
        );
        let outcome = match self
            .retriever
            .retrieve(query, top_k, request.filter.as_ref(), min_similarity, request.hybrid)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(stage = "RETRIEVING", error = %e, "Retrieval failed");
                return GenerationResult::no_context();
            }
        };

        let num_chunks = outcome.len();
        if num_chunks == 0 {
            debug!(stage = "EMPTY", "No chunks cleared the relevance floor");
            return GenerationResult::no_context();
        }

        let (context, source_map) = self.assembler.assemble(&outcome.citables());
        debug!(
            stage = "READY",
            num_chunks,
            mode = outcome.mode(),
            context_len = context.len(),
            "Context assembled"
        );

        let messages = build_messages(query, &context);
        debug!(stage = "GENERATING", num_chunks, "Generating answer");
        let answer = match self.generator.generate(&messages).await {
            Ok(answer) => answer,
            Err(e) => {
                warn!(stage = "LLM_FAILURE", num_chunks, error = %e, "Generation failed");
                return GenerationResult::llm_error(e, num_chunks);
            }
        };

        debug!(stage = "ANSWER_READY", answer_len = answer.len(), "Answer generated");
        debug!(stage = "EXTRACTING", "Validating citations");
        let sources = self.extractor.cited_sources(&answer, &source_map);
        debug!(stage = "SUCCESS", num_chunks, cited = sources.len(), "Answer complete");

        GenerationResult {
            answer,
            sources,
            status: GenerationStatus::Success,
            num_chunks_retrieved: num_chunks,
        }
    }
}
