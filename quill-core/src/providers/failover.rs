//! Ordered primary/backup failover.
//!
//! The primary is tried first when configured. A transient failure
//! (rate limit, connection trouble, upstream 5xx) falls through to the
//! backup; any other primary failure is terminal. There is no retry loop:
//! each provider gets exactly one attempt, in order, never raced.

use crate::brain::LlmProvider;
use crate::error::{ErrorClass, LlmError};
use crate::types::{CompletionRequest, Message};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Sends prompts to the primary provider, falling back to the backup.
pub struct FailoverGenerator {
    primary: Option<Arc<dyn LlmProvider>>,
    backup: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: usize,
}

impl FailoverGenerator {
    /// `primary` is `None` when its credential is not configured.
    pub fn new(primary: Option<Arc<dyn LlmProvider>>, backup: Arc<dyn LlmProvider>) -> Self {
        let defaults = CompletionRequest::default();
        Self {
            primary,
            backup,
            temperature: defaults.temperature,
            max_tokens: defaults.max_tokens.unwrap_or(1024),
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: usize) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Labels of the providers in attempt order.
    pub fn provider_chain(&self) -> Vec<String> {
        self.primary
            .iter()
            .chain(std::iter::once(&self.backup))
            .map(|p| format!("{}/{}", p.provider_name(), p.model_name()))
            .collect()
    }

    fn request(&self, messages: &[Message]) -> CompletionRequest {
        CompletionRequest {
            messages: messages.to_vec(),
            temperature: self.temperature,
            max_tokens: Some(self.max_tokens),
            model: None,
        }
    }

    /// Generate answer text for `messages`.
    ///
    /// Returns the primary's terminal errors unchanged; a backup failure
    /// becomes [`LlmError::ProvidersExhausted`] with a remediation hint.
    pub async fn generate(&self, messages: &[Message]) -> Result<String, LlmError> {
        let request = self.request(messages);

        if let Some(primary) = &self.primary {
            debug!(provider = primary.provider_name(), model = primary.model_name(), "Trying primary provider");
            match primary.complete(request.clone()).await {
                Ok(response) => {
                    debug!(
                        provider = primary.provider_name(),
                        output_tokens = response.usage.output_tokens,
                        "Primary provider answered"
                    );
                    return Ok(response.message.content);
                }
                Err(e) if e.class() == ErrorClass::Transient => {
                    warn!(
                        provider = primary.provider_name(),
                        fallback = self.backup.provider_name(),
                        error = %e,
                        "Primary provider failed transiently, falling back"
                    );
                }
                Err(e) => {
                    error!(provider = primary.provider_name(), error = %e, "Primary provider failed");
                    return Err(e);
                }
            }
        } else {
            info!(provider = self.backup.provider_name(), "No primary provider configured, using backup");
        }

        match self.backup.complete(request).await {
            Ok(response) => Ok(response.message.content),
            Err(e) => {
                let message = self.exhausted_message(&e);
                error!(provider = self.backup.provider_name(), error = %e, "All providers failed");
                Err(LlmError::ProvidersExhausted { message })
            }
        }
    }

    fn exhausted_message(&self, backup_error: &LlmError) -> String {
        let backup = self.backup.provider_name();
        let model = self.backup.model_name();
        let attempted = if self.primary.is_some() {
            "Primary and backup providers both failed"
        } else {
            "No primary provider configured and the backup failed"
        };
        let hint = match backup_error {
            LlmError::Connection { .. } | LlmError::Timeout { .. } => {
                format!("Is {backup} running? Start it with `ollama serve`.")
            }
            LlmError::ApiRequest { .. } => {
                format!("Is model '{model}' available? Pull it with `ollama pull {model}`.")
            }
            _ => format!("Check the {backup} provider configuration."),
        };
        format!("{attempted} ({backup}: {backup_error}). {hint}")
    }
}

impl std::fmt::Debug for FailoverGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FailoverGenerator")
            .field("chain", &self.provider_chain())
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}
