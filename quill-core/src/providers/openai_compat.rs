//! OpenAI-compatible chat completion provider.
//!
//! Covers Groq, OpenAI, Ollama (`/v1`), vLLM, LM Studio and anything else
//! that speaks the `/chat/completions` wire format.

use crate::brain::LlmProvider;
use crate::config::ProviderConfig;
use crate::error::LlmError;
use crate::types::{CompletionRequest, CompletionResponse, Message, TokenUsage};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

/// Bearer token sent to local servers that ignore authentication.
const LOCAL_DUMMY_KEY: &str = "ollama";

/// Fallback wait when a 429 carries no usable hint.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// OpenAI-compatible LLM provider.
pub struct OpenAiCompatibleProvider {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for OpenAiCompatibleProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiCompatibleProvider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiCompatibleProvider {
    /// Create a provider from configuration.
    ///
    /// Local endpoints without a key get a dummy bearer token. Remote
    /// endpoints without a key fail with `AuthFailed`.
    pub fn new(config: &ProviderConfig, timeout_secs: u64) -> Result<Self, LlmError> {
        let api_key = match config.resolve_api_key() {
            Some(key) => key,
            None if config.is_local() => {
                debug!(provider = %config.name, "No API key for local provider; using dummy bearer token");
                LOCAL_DUMMY_KEY.to_string()
            }
            None => {
                return Err(LlmError::AuthFailed {
                    provider: match &config.api_key_env {
                        Some(var) => format!("{}: env var '{}' not set", config.name, var),
                        None => format!("{}: no API key configured", config.name),
                    },
                });
            }
        };
        Self::new_with_key(config, api_key, timeout_secs)
    }

    /// Create a provider with an already-resolved API key.
    pub fn new_with_key(
        config: &ProviderConfig,
        api_key: String,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            name: config.name.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout_secs,
        })
    }

    fn messages_to_json(messages: &[Message]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| json!({ "role": msg.role.to_string(), "content": msg.content }))
            .collect()
    }

    /// Parse an OpenAI-format response body.
    fn parse_response(body: &Value, model: &str) -> Result<CompletionResponse, LlmError> {
        let choice =
            body.get("choices")
                .and_then(|c| c.get(0))
                .ok_or_else(|| LlmError::ResponseParse {
                    message: "No choices in response".to_string(),
                })?;

        let content = choice
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| LlmError::ResponseParse {
                message: "No message content in choice".to_string(),
            })?;

        let finish_reason = choice
            .get("finish_reason")
            .and_then(|f| f.as_str())
            .map(|s| s.to_string());

        let usage = body
            .get("usage")
            .map(|u| TokenUsage {
                input_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0)
                    as usize,
                output_tokens: u
                    .get("completion_tokens")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as usize,
            })
            .unwrap_or_default();

        let model = body
            .get("model")
            .and_then(|m| m.as_str())
            .unwrap_or(model)
            .to_string();

        Ok(CompletionResponse {
            message: Message::assistant(content),
            usage,
            model,
            finish_reason,
        })
    }

    /// Map a non-success HTTP status to a classified error.
    fn map_http_error(&self, status: reqwest::StatusCode, body: &str) -> LlmError {
        match status.as_u16() {
            401 | 403 => {
                debug!(body = %body, status = status.as_u16(), "Authentication failed");
                LlmError::AuthFailed {
                    provider: self.name.clone(),
                }
            }
            429 => LlmError::RateLimited {
                retry_after_secs: parse_retry_after(body).unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            },
            code if code >= 500 => LlmError::ServerError {
                status: code,
                message: truncate(body, 200),
            },
            code => LlmError::ApiRequest {
                message: format!("HTTP {}: {}", code, truncate(body, 200)),
            },
        }
    }

    fn map_send_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            LlmError::Connection {
                message: format!("{} at {}: {}", self.name, self.base_url, e),
            }
        }
    }
}

/// Pull "try again in Xs" out of an OpenAI-style rate-limit body.
fn parse_retry_after(body: &str) -> Option<u64> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let msg = parsed.get("error")?.get("message")?.as_str()?;
    let tail = msg.split("in ").last()?;
    let secs: String = tail
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    secs.parse::<f64>().ok().map(|s| s.ceil() as u64)
}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{head}...")
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": request.model.as_deref().unwrap_or(&self.model),
            "messages": Self::messages_to_json(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        debug!(url = %url, provider = %self.name, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(self.map_http_error(status, &response_body));
        }

        let json: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {e}"),
            })?;

        Self::parse_response(&json, &self.model)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
