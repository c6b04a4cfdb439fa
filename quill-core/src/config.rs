//! Configuration system for Quill.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/quill/config.toml` and/or `.quill/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::embeddings::EmbeddingConfig;
use crate::error::ConfigError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

/// One chat-completion endpoint (OpenAI-compatible wire format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Label used in logs and error messages ("groq", "ollama", ...).
    pub name: String,
    /// Model identifier sent with each request.
    pub model: String,
    /// Base URL of the OpenAI-compatible API (without `/chat/completions`).
    pub base_url: String,
    /// Environment variable holding the API key, if the endpoint needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Inline API key. Takes precedence over `api_key_env`.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key from the inline value or the named environment
    /// variable. Empty values count as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Some(key.clone());
        }
        let var = self.api_key_env.as_ref()?;
        std::env::var(var).ok().filter(|k| !k.trim().is_empty())
    }

    /// Whether the endpoint is served from this machine.
    pub fn is_local(&self) -> bool {
        self.base_url.contains("localhost") || self.base_url.contains("127.0.0.1")
    }
}

/// Generation (inference) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Preferred provider. Used only when its API key resolves.
    pub primary: ProviderConfig,
    /// Always-available provider, normally a local Ollama server.
    pub backup: ProviderConfig,
    pub temperature: f32,
    pub max_tokens: usize,
    /// Per-request HTTP timeout.
    pub request_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            primary: ProviderConfig {
                name: "groq".to_string(),
                model: "llama-3.3-70b-versatile".to_string(),
                base_url: "https://api.groq.com/openai/v1".to_string(),
                api_key_env: Some("GROQ_API_KEY".to_string()),
                api_key: None,
            },
            backup: ProviderConfig {
                name: "ollama".to_string(),
                model: "llama3.2".to_string(),
                base_url: "http://localhost:11434/v1".to_string(),
                api_key_env: None,
                api_key: None,
            },
            temperature: 0.3,
            max_tokens: 1024,
            request_timeout_secs: 120,
        }
    }
}

/// Retrieval and fusion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the context assembler.
    pub top_k: usize,
    /// Semantic similarity floor (`1 - cosine distance`).
    pub min_similarity: f32,
    /// Fuse lexical and semantic results. When false only semantic search runs.
    pub hybrid: bool,
    /// RRF smoothing constant.
    pub rrf_k: f64,
    pub lexical_weight: f64,
    pub semantic_weight: f64,
    /// Each search path retrieves `over_retrieval_factor * top_k` before fusion.
    pub over_retrieval_factor: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.3,
            hybrid: true,
            rrf_k: 60.0,
            lexical_weight: 0.5,
            semantic_weight: 0.5,
            over_retrieval_factor: 2,
        }
    }
}

/// On-disk index locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding the chunk database and the lexical index.
    pub data_dir: PathBuf,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".quill"),
        }
    }
}

impl IndexConfig {
    pub fn chunks_db_path(&self) -> PathBuf {
        self.data_dir.join("chunks.db")
    }

    pub fn lexical_index_path(&self) -> PathBuf {
        self.data_dir.join("lexical_index")
    }

    /// Resolve a relative `data_dir` against the given workspace.
    pub fn rooted_at(&self, workspace: &Path) -> IndexConfig {
        if self.data_dir.is_absolute() {
            self.clone()
        } else {
            IndexConfig {
                data_dir: workspace.join(&self.data_dir),
            }
        }
    }
}

impl QuillConfig {
    /// Fail on settings the pipeline cannot run without. The backup provider
    /// is always used, so its model and endpoint must be set.
    pub fn require_fields(&self) -> Result<(), ConfigError> {
        let required = [
            ("generation.primary.model", &self.generation.primary.model),
            ("generation.backup.model", &self.generation.backup.model),
            ("generation.backup.base_url", &self.generation.backup.base_url),
        ];
        match required.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ConfigError::MissingField {
                field: (*field).to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Check for suspicious settings. Returns human-readable warnings; an empty
    /// list means nothing looked off.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        let temperature = self.generation.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            warnings.push(format!(
                "generation.temperature is {temperature}, outside the usual 0.0-2.0 range"
            ));
        }
        if self.generation.max_tokens == 0 {
            warnings.push("generation.max_tokens is 0, answers will be empty".to_string());
        }
        if self.retrieval.top_k == 0 {
            warnings.push("retrieval.top_k is 0, every query will return no context".to_string());
        }
        if self.retrieval.over_retrieval_factor < 1 {
            warnings.push(
                "retrieval.over_retrieval_factor is below 1, fusion will see fewer than top_k candidates"
                    .to_string(),
            );
        }
        if self.retrieval.lexical_weight <= 0.0 && self.retrieval.semantic_weight <= 0.0 {
            warnings.push(
                "retrieval.lexical_weight and retrieval.semantic_weight are both zero, all fusion scores will be 0"
                    .to_string(),
            );
        }
        if self.retrieval.rrf_k < 0.0 {
            warnings.push(format!(
                "retrieval.rrf_k is {}, negative values invert the rank weighting",
                self.retrieval.rrf_k
            ));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_similarity) {
            warnings.push(format!(
                "retrieval.min_similarity is {}, cosine similarity lies in -1.0..=1.0",
                self.retrieval.min_similarity
            ));
        }

        warnings
    }
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "quill", "quill")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".quill").join("config.toml")
}

/// Load configuration with layered merging.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `QUILL_`)
/// 3. Workspace-local config (`.quill/config.toml`)
/// 4. User config (`~/.config/quill/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&QuillConfig>,
) -> Result<QuillConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(QuillConfig::default()));

    if let Some(user_config) = user_config_path()
        && user_config.exists()
    {
        figment = figment.merge(Toml::file(&user_config));
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // QUILL_RETRIEVAL__TOP_K, QUILL_GENERATION__PRIMARY__MODEL, etc.
    figment = figment.merge(Env::prefixed("QUILL_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Paths consulted by [`load_config`], in merge order, with whether each exists.
pub fn config_sources(workspace: Option<&Path>) -> Vec<(PathBuf, bool)> {
    let mut sources = Vec::new();
    if let Some(user_config) = user_config_path() {
        let exists = user_config.exists();
        sources.push((user_config, exists));
    }
    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        let exists = ws_config.exists();
        sources.push((ws_config, exists));
    }
    sources
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = QuillConfig::default();
        assert_eq!(config.generation.primary.name, "groq");
        assert_eq!(config.generation.primary.model, "llama-3.3-70b-versatile");
        assert_eq!(config.generation.backup.base_url, "http://localhost:11434/v1");
        assert_eq!(config.generation.backup.model, "llama3.2");
        assert!((config.generation.temperature - 0.3).abs() < f32::EPSILON);
        assert_eq!(config.generation.max_tokens, 1024);
        assert_eq!(config.retrieval.top_k, 5);
        assert!(config.retrieval.hybrid);
        assert_eq!(config.retrieval.rrf_k, 60.0);
        assert_eq!(config.retrieval.over_retrieval_factor, 2);
        assert_eq!(config.embedding.provider, "local");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_index_paths() {
        let index = IndexConfig::default();
        assert_eq!(index.chunks_db_path(), PathBuf::from(".quill/chunks.db"));
        assert_eq!(
            index.lexical_index_path(),
            PathBuf::from(".quill/lexical_index")
        );
        let rooted = index.rooted_at(Path::new("/srv/kb"));
        assert_eq!(rooted.data_dir, PathBuf::from("/srv/kb/.quill"));
    }

    #[test]
    fn test_resolve_inline_api_key() {
        let mut provider = GenerationConfig::default().primary;
        provider.api_key = Some("gsk-inline".into());
        provider.api_key_env = Some("QUILL_TEST_UNSET_VAR_7731".into());
        assert_eq!(provider.resolve_api_key().as_deref(), Some("gsk-inline"));

        provider.api_key = Some("   ".into());
        assert_eq!(provider.resolve_api_key(), None);
    }

    #[test]
    fn test_backup_has_no_key() {
        let backup = GenerationConfig::default().backup;
        assert!(backup.is_local());
        assert_eq!(backup.resolve_api_key(), None);
    }

    #[test]
    fn test_validate_warnings() {
        let mut config = QuillConfig::default();
        config.generation.temperature = 3.5;
        config.retrieval.top_k = 0;
        config.retrieval.lexical_weight = 0.0;
        config.retrieval.semantic_weight = 0.0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("temperature")));
        assert!(warnings.iter().any(|w| w.contains("top_k")));
        assert!(warnings.iter().any(|w| w.contains("both zero")));
    }

    #[test]
    fn test_require_fields() {
        let mut config = QuillConfig::default();
        assert!(config.require_fields().is_ok());

        config.generation.backup.model = "  ".into();
        match config.require_fields() {
            Err(ConfigError::MissingField { field }) => {
                assert_eq!(field, "generation.backup.model")
            }
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None, None).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.generation.backup.name, "ollama");
    }

    #[test]
    fn test_load_config_with_overrides() {
        let mut overrides = QuillConfig::default();
        overrides.retrieval.top_k = 8;
        overrides.generation.backup.model = "qwen2.5".to_string();

        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.retrieval.top_k, 8);
        assert_eq!(config.generation.backup.model, "qwen2.5");
    }

    #[test]
    fn test_load_config_from_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let quill_dir = dir.path().join(".quill");
        std::fs::create_dir_all(&quill_dir).unwrap();
        std::fs::write(
            quill_dir.join("config.toml"),
            r#"
[retrieval]
top_k = 3
min_similarity = 0.5
hybrid = false
rrf_k = 30.0
lexical_weight = 0.7
semantic_weight = 0.3
over_retrieval_factor = 3

[embedding]
provider = "ollama"
model = "nomic-embed-text"
"#,
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.retrieval.top_k, 3);
        assert!(!config.retrieval.hybrid);
        assert_eq!(config.retrieval.rrf_k, 30.0);
        assert_eq!(config.embedding.provider, "ollama");
        assert_eq!(config.embedding.model.as_deref(), Some("nomic-embed-text"));
        // Sections absent from the file keep their defaults.
        assert_eq!(config.generation.max_tokens, 1024);

        let sources = config_sources(Some(dir.path()));
        assert!(sources.iter().any(|(path, exists)| path.ends_with(".quill/config.toml") && *exists));
    }

    #[test]
    fn test_config_toml_roundtrip_hides_inline_key() {
        let mut config = QuillConfig::default();
        config.generation.primary.api_key = Some("secret".into());
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("GROQ_API_KEY"));
    }
}
