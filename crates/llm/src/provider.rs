use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

/// A single role-tagged message sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// LLM completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// LLM completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Error type for LLM operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LlmError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("rate limited")]
    RateLimited,
    #[error("{0}")]
    RequestFailed(String),
    #[error("request timed out")]
    Timeout,
}

/// Trait for text-completion providers.
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>>;
}

/// Stand-in used when no API key is configured. Every call fails with `Unavailable`.
#[derive(Debug, Clone, Default)]
pub struct DisabledProvider;

impl LlmProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        Box::pin(async { Err(LlmError::Unavailable("no model API key configured".into())) })
    }
}

/// Mock provider for tests. Returns a fixed response or a fixed error
/// and records every request it receives.
#[derive(Debug, Default)]
pub struct MockProvider {
    outcome: Option<Result<String, LlmError>>,
    seen: Mutex<Vec<CompletionRequest>>,
}

impl MockProvider {
    pub fn new(response: impl Into<String>) -> Self {
        Self { outcome: Some(Ok(response.into())), seen: Mutex::new(Vec::new()) }
    }

    pub fn failing(error: LlmError) -> Self {
        Self { outcome: Some(Err(error)), seen: Mutex::new(Vec::new()) }
    }

    /// Number of `complete` calls so far.
    pub fn calls(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.seen.lock().ok().and_then(|s| s.last().cloned())
    }
}

impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(request);
        }
        let outcome = self
            .outcome
            .clone()
            .unwrap_or_else(|| Ok(String::new()));
        Box::pin(async move {
            outcome.map(|content| CompletionResponse {
                content,
                input_tokens: 10,
                output_tokens: 20,
            })
        })
    }
}
