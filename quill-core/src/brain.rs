//! Brain module: inference provider abstraction.
//!
//! Defines the `LlmProvider` trait that every chat-completion backend
//! implements, plus `MockLlmProvider`, a scriptable in-process provider used
//! by tests and benchmarks.

use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use std::sync::Mutex;

/// Trait for chat-completion providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Perform a full completion and return the response.
    ///
    /// Failures carry a classified [`LlmError`]; callers decide whether to
    /// fall through to another provider by inspecting [`LlmError::class`].
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Return the model name.
    fn model_name(&self) -> &str;

    /// Return a short provider label used in logs ("groq", "ollama", ...).
    fn provider_name(&self) -> &str;
}

/// A mock LLM provider for testing.
///
/// Outcomes are consumed in FIFO order. Once the queue is drained, the
/// fallback outcome is returned (a fixed text unless `failing_with` was used).
/// Every request is recorded so tests can assert on what was sent.
pub struct MockLlmProvider {
    model: String,
    name: String,
    outcomes: Mutex<Vec<Result<CompletionResponse, LlmError>>>,
    fallback: Fallback,
    requests: Mutex<Vec<CompletionRequest>>,
}

enum Fallback {
    Text(String),
    Error(fn() -> LlmError),
}

impl MockLlmProvider {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            name: "mock".to_string(),
            outcomes: Mutex::new(Vec::new()),
            fallback: Fallback::Text("I'm a mock LLM. No queued responses available.".to_string()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a MockLlmProvider that always returns the given text.
    pub fn with_response(text: &str) -> Self {
        Self {
            fallback: Fallback::Text(text.to_string()),
            ..Self::new()
        }
    }

    /// Create a MockLlmProvider that fails every call with a fresh error
    /// produced by `make_error`.
    pub fn failing_with(make_error: fn() -> LlmError) -> Self {
        Self {
            fallback: Fallback::Error(make_error),
            ..Self::new()
        }
    }

    /// Set the label reported by `provider_name`.
    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Queue a response to be returned by the next `complete` call.
    pub fn queue_response(&self, response: CompletionResponse) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push(Ok(response));
        }
    }

    /// Queue an error to be returned by the next `complete` call.
    pub fn queue_error(&self, error: LlmError) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push(Err(error));
        }
    }

    /// Create a simple text response for testing.
    pub fn text_response(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 50,
            },
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }
    }

    /// Number of `complete` calls seen so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Every request received, in call order.
    pub fn recorded_requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Default for MockLlmProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        let queued = match self.outcomes.lock() {
            Ok(mut outcomes) if !outcomes.is_empty() => Some(outcomes.remove(0)),
            _ => None,
        };
        match queued {
            Some(outcome) => outcome,
            None => match &self.fallback {
                Fallback::Text(text) => Ok(Self::text_response(text)),
                Fallback::Error(make_error) => Err(make_error()),
            },
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_default_response() {
        let provider = MockLlmProvider::new();
        let response = provider
            .complete(CompletionRequest::default())
            .await
            .unwrap();
        assert_eq!(
            response.text(),
            "I'm a mock LLM. No queued responses available."
        );
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_queue_is_fifo() {
        let provider = MockLlmProvider::with_response("fallback");
        provider.queue_response(MockLlmProvider::text_response("first"));
        provider.queue_error(LlmError::RateLimited {
            retry_after_secs: 1,
        });

        let first = provider.complete(CompletionRequest::default()).await;
        assert_eq!(first.unwrap().text(), "first");

        let second = provider.complete(CompletionRequest::default()).await;
        assert!(matches!(second, Err(LlmError::RateLimited { .. })));

        let third = provider.complete(CompletionRequest::default()).await;
        assert_eq!(third.unwrap().text(), "fallback");
    }

    #[tokio::test]
    async fn test_mock_failing_with() {
        let provider = MockLlmProvider::failing_with(|| LlmError::Connection {
            message: "refused".into(),
        })
        .named("groq");
        assert_eq!(provider.provider_name(), "groq");
        for _ in 0..3 {
            let result = provider.complete(CompletionRequest::default()).await;
            assert!(matches!(result, Err(LlmError::Connection { .. })));
        }
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_records_requests() {
        let provider = MockLlmProvider::new();
        let request = CompletionRequest {
            messages: vec![Message::user("What is CAP?")],
            temperature: 0.3,
            max_tokens: Some(1024),
            model: None,
        };
        provider.complete(request.clone()).await.unwrap();
        assert_eq!(provider.recorded_requests(), vec![request]);
    }
}
