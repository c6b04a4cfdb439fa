//! Pluggable embedding providers for semantic search.
//!
//! Provides a trait-based abstraction over embedding models, with
//! implementations for a local hashed term-frequency model (always available,
//! no network), the Ollama API, and the OpenAI API. The provider is selected
//! once at composition time by [`create_embedder`].
//!
//! Query embeddings must come from the same model that embedded the indexed
//! chunks. Each embedder reports a stable [`Embedder::model_id`] which the
//! chunk store records at build time and checks at open time.

use crate::error::{ConfigError, RetrievalError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for embedding providers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    /// Generate embeddings for a batch of texts.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Return the dimensionality of embeddings.
    fn dimensions(&self) -> usize;

    /// Return the provider name.
    fn provider_name(&self) -> &str;

    /// Stable identifier of the embedding space, e.g. `ollama:nomic-embed-text`.
    fn model_id(&self) -> String;
}

/// Configuration for embedding providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Provider name: "local" (default), "ollama", "openai".
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Provider-specific model name.
    #[serde(default)]
    pub model: Option<String>,
    /// Embedding dimensions (provider default if 0).
    #[serde(default)]
    pub dimensions: usize,
    /// Optional base URL override for remote providers.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the OpenAI key.
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,
}

fn default_provider() -> String {
    "local".into()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dimensions: 0,
            base_url: None,
            api_key_env: default_openai_key_env(),
        }
    }
}

const LOCAL_DEFAULT_DIMENSIONS: usize = 128;

/// Local hashed term-frequency embedder (always available, no network).
#[derive(Debug, Clone)]
pub struct LocalEmbedder {
    dimensions: usize,
}

impl LocalEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lowered = text.to_lowercase();
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            *tf.entry(word).or_insert(0) += 1;
        }

        for (term, count) in &tf {
            let idx = djb2(term) % self.dimensions;
            vector[idx] += *count as f32;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        vector
    }
}

fn djb2(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

#[async_trait]
impl Embedder for LocalEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        Ok(self.embed_text(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "local"
    }

    fn model_id(&self) -> String {
        format!("local:hash-tf-{}", self.dimensions)
    }
}

fn embedding_error(provider: &str, message: impl std::fmt::Display) -> RetrievalError {
    RetrievalError::Embedding {
        message: format!("{provider}: {message}"),
    }
}

/// Pull a float array out of a JSON value.
fn parse_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|arr| arr.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
}

/// OpenAI API embedder (uses text-embedding-3-small by default).
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dims: usize,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "text-embedding-3-small".into());
        let dims = match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        };
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com".into()),
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| embedding_error("openai", e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(embedding_error("openai", format!("HTTP {status}")));
        }
        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| embedding_error("openai", e))?;
        parse_vector(&json["data"][0]["embedding"])
            .ok_or_else(|| embedding_error("openai", "response has no data[0].embedding"))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> String {
        format!("openai:{}", self.model)
    }
}

/// Ollama embedder (uses local Ollama API).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    dims: usize,
    base_url: String,
}

impl OllamaEmbedder {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| "nomic-embed-text".into());
        let dims = match model.as_str() {
            "mxbai-embed-large" => 1024,
            "all-minilm" => 384,
            _ => 768,
        };
        Self {
            client: reqwest::Client::new(),
            model,
            dims,
            base_url: base_url.unwrap_or_else(|| "http://localhost:11434".into()),
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        let url = format!("{}/api/embed", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| embedding_error("ollama", e))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(embedding_error("ollama", format!("HTTP {status}")));
        }
        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| embedding_error("ollama", e))?;
        parse_vector(&json["embeddings"][0])
            .ok_or_else(|| embedding_error("ollama", "response has no embeddings[0]"))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }

    fn model_id(&self) -> String {
        format!("ollama:{}", self.model)
    }
}

/// Factory function to create an embedder based on configuration.
///
/// A missing OpenAI key is an error rather than a silent switch to the local
/// embedder: swapping embedding spaces would make every stored vector
/// meaningless to the query.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>, ConfigError> {
    match config.provider.as_str() {
        "local" => {
            let dims = if config.dimensions > 0 {
                config.dimensions
            } else {
                LOCAL_DEFAULT_DIMENSIONS
            };
            Ok(Arc::new(LocalEmbedder::new(dims)))
        }
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(
            config.model.clone(),
            config.base_url.clone(),
        ))),
        "openai" => {
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| ConfigError::EnvVarMissing {
                    var: config.api_key_env.clone(),
                })?;
            Ok(Arc::new(OpenAiEmbedder::new(
                api_key,
                config.model.clone(),
                config.base_url.clone(),
            )))
        }
        other => Err(ConfigError::Invalid {
            message: format!(
                "unknown embedding provider '{other}' (expected local, ollama or openai)"
            ),
        }),
    }
}

/// Cosine similarity between two vectors. Zero-norm or mismatched inputs
/// yield 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
