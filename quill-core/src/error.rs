//! Error types for the Quill core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering inference providers, retrieval collaborators, and configuration.
//! Expected failure modes never leave the pipeline as errors: they are folded
//! into a `GenerationStatus` by [`crate::pipeline::AnswerPipeline`].

/// Top-level error type for the Quill core library.
#[derive(Debug, thiserror::Error)]
pub enum QuillError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How the failover orchestrator should treat a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Rate limiting, connection trouble, or an upstream 5xx. The next
    /// provider in line may succeed.
    Transient,
    /// Anything else. Trying another provider would not help.
    Terminal,
}

/// Errors from inference provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Upstream server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("{message}")]
    ProvidersExhausted { message: String },
}

impl LlmError {
    /// Classify this error for failover purposes.
    pub fn class(&self) -> ErrorClass {
        match self {
            LlmError::RateLimited { .. }
            | LlmError::Connection { .. }
            | LlmError::Timeout { .. }
            | LlmError::ServerError { .. } => ErrorClass::Transient,
            LlmError::ApiRequest { .. }
            | LlmError::ResponseParse { .. }
            | LlmError::AuthFailed { .. }
            | LlmError::ProvidersExhausted { .. } => ErrorClass::Terminal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Errors from the retrieval collaborators (embedder, indexes, storage).
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("Embedding failed: {message}")]
    Embedding { message: String },

    #[error("Vector index error: {message}")]
    VectorIndex { message: String },

    #[error("Lexical index error: {message}")]
    LexicalIndex { message: String },

    #[error("Chunk storage error: {message}")]
    Storage { message: String },

    #[error(
        "Embedding model mismatch: index was built with '{indexed}' but the configured embedder is '{configured}'"
    )]
    EmbeddingModelMismatch { indexed: String, configured: String },
}

impl From<rusqlite::Error> for RetrievalError {
    fn from(e: rusqlite::Error) -> Self {
        RetrievalError::Storage {
            message: e.to_string(),
        }
    }
}

impl From<tantivy::TantivyError> for RetrievalError {
    fn from(e: tantivy::TantivyError) -> Self {
        RetrievalError::LexicalIndex {
            message: e.to_string(),
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Environment variable not set: {var}")]
    EnvVarMissing { var: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError::ParseError {
            message: e.to_string(),
        }
    }
}

/// A type alias for results using the top-level `QuillError`.
pub type Result<T> = std::result::Result<T, QuillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_llm() {
        let err = QuillError::Llm(LlmError::ApiRequest {
            message: "connection refused".into(),
        });
        assert_eq!(
            err.to_string(),
            "LLM error: API request failed: connection refused"
        );
    }

    #[test]
    fn test_error_display_retrieval() {
        let err = QuillError::Retrieval(RetrievalError::EmbeddingModelMismatch {
            indexed: "local:hash-tf-128".into(),
            configured: "ollama:nomic-embed-text".into(),
        });
        assert_eq!(
            err.to_string(),
            "Retrieval error: Embedding model mismatch: index was built with 'local:hash-tf-128' but the configured embedder is 'ollama:nomic-embed-text'"
        );
    }

    #[test]
    fn test_error_display_config() {
        let err = QuillError::Config(ConfigError::MissingField {
            field: "generation.backup.model".into(),
        });
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required field: generation.backup.model"
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::RateLimited { retry_after_secs: 5 }.is_transient());
        assert!(
            LlmError::Connection {
                message: "refused".into()
            }
            .is_transient()
        );
        assert!(LlmError::Timeout { timeout_secs: 30 }.is_transient());
        assert!(
            LlmError::ServerError {
                status: 503,
                message: "overloaded".into()
            }
            .is_transient()
        );
    }

    #[test]
    fn test_terminal_classification() {
        assert_eq!(
            LlmError::AuthFailed {
                provider: "groq".into()
            }
            .class(),
            ErrorClass::Terminal
        );
        assert_eq!(
            LlmError::ApiRequest {
                message: "HTTP 400".into()
            }
            .class(),
            ErrorClass::Terminal
        );
        assert_eq!(
            LlmError::ResponseParse {
                message: "no choices".into()
            }
            .class(),
            ErrorClass::Terminal
        );
        assert_eq!(
            LlmError::ProvidersExhausted {
                message: "all down".into()
            }
            .class(),
            ErrorClass::Terminal
        );
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: QuillError = io_err.into();
        assert!(matches!(err, QuillError::Io(_)));
    }

    #[test]
    fn test_error_from_serde() {
        let serde_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: QuillError = serde_err.into();
        assert!(matches!(err, QuillError::Serialization(_)));
    }

    #[test]
    fn test_retrieval_error_from_sqlite() {
        let err: RetrievalError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, RetrievalError::Storage { .. }));
    }
}
