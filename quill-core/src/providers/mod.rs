//! Inference provider implementations.
//!
//! - `OpenAiCompatibleProvider` speaks the `/chat/completions` format shared
//!   by Groq, OpenAI, Ollama, vLLM and LM Studio.
//! - `FailoverGenerator` orders a primary and a backup provider.
//!
//! Use `build_generator()` to assemble both from configuration.

pub mod failover;
pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::GenerationConfig;
use crate::error::LlmError;
use std::sync::Arc;
use tracing::info;

pub use failover::FailoverGenerator;
pub use openai_compat::OpenAiCompatibleProvider;

/// Build the failover generator described by `config`.
///
/// The primary slot is filled only when its API key resolves; otherwise
/// every request goes straight to the backup. The backup never needs a key
/// when it is local.
pub fn build_generator(config: &GenerationConfig) -> Result<FailoverGenerator, LlmError> {
    let primary: Option<Arc<dyn LlmProvider>> = match config.primary.resolve_api_key() {
        Some(key) => Some(Arc::new(OpenAiCompatibleProvider::new_with_key(
            &config.primary,
            key,
            config.request_timeout_secs,
        )?)),
        None => {
            info!(
                provider = %config.primary.name,
                key_env = config.primary.api_key_env.as_deref().unwrap_or("-"),
                "Primary provider has no API key; backup only"
            );
            None
        }
    };

    let backup: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(
        &config.backup,
        config.request_timeout_secs,
    )?);

    Ok(FailoverGenerator::new(primary, backup)
        .with_sampling(config.temperature, config.max_tokens))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    #[test]
    fn test_build_without_primary_key() {
        let mut config = GenerationConfig::default();
        config.primary.api_key_env = Some("QUILL_TEST_NEVER_SET_GROQ_KEY".into());
        let generator = build_generator(&config).unwrap();
        assert!(!generator.has_primary());
        assert_eq!(generator.provider_chain(), vec!["ollama/llama3.2"]);
    }

    #[test]
    fn test_build_with_inline_primary_key() {
        let mut config = GenerationConfig::default();
        config.primary.api_key = Some("gsk-test".into());
        let generator = build_generator(&config).unwrap();
        assert!(generator.has_primary());
        assert_eq!(
            generator.provider_chain(),
            vec!["groq/llama-3.3-70b-versatile", "ollama/llama3.2"]
        );
    }

    #[test]
    fn test_remote_backup_without_key_fails() {
        let config = GenerationConfig {
            backup: ProviderConfig {
                name: "remote".into(),
                model: "m".into(),
                base_url: "https://llm.example.com/v1".into(),
                api_key_env: None,
                api_key: None,
            },
            ..GenerationConfig::default()
        };
        assert!(matches!(
            build_generator(&config),
            Err(LlmError::AuthFailed { .. })
        ));
    }
}
