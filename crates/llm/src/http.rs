//! HTTP-based LLM provider.
//!
//! Speaks the OpenAI-compatible `/chat/completions` protocol, which also covers
//! Gemini's and DeepSeek's compatibility endpoints and most local gateways.

use crate::provider::{CompletionRequest, CompletionResponse, LlmError, LlmProvider};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 25;

#[derive(Serialize)]
struct OaiRequest<'a> {
    model: &'a str,
    messages: Vec<OaiMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct OaiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OaiResponse {
    #[serde(default)]
    choices: Vec<OaiChoice>,
    usage: Option<OaiUsage>,
}

#[derive(Deserialize)]
struct OaiChoice {
    message: OaiChoiceMessage,
}

#[derive(Deserialize)]
struct OaiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OaiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct OaiErrorBody {
    error: OaiErrorDetail,
}

#[derive(Deserialize)]
struct OaiErrorDetail {
    message: String,
}

/// OpenAI-compatible chat completion provider.
pub struct HttpProvider {
    model: String,
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    /// Build from model name + API key + optional base URL override.
    /// `timeout` bounds the whole request, including reading the body.
    pub fn new(model: String, api_key: String, base_url: Option<String>, timeout: Duration) -> Self {
        let base = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "failed to build timed HTTP client, using defaults");
                reqwest::Client::new()
            });
        Self {
            model,
            client,
            base_url: base.trim_end_matches('/').to_owned(),
            api_key,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn complete_openai(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let body = OaiRequest {
            model: &self.model,
            messages: request
                .messages
                .iter()
                .map(|m| OaiMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(check_error(status, &text));
        }

        let api: OaiResponse = resp.json().await.map_err(transport_error)?;

        let content = api
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_owned();
        let (input_tokens, output_tokens) = api
            .usage
            .map(|u| (u.prompt_tokens, u.completion_tokens))
            .unwrap_or((0, 0));

        tracing::debug!(model = %self.model, input_tokens, output_tokens, "completion received");
        Ok(CompletionResponse { content, input_tokens, output_tokens })
    }
}

fn transport_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() {
        LlmError::Timeout
    } else {
        LlmError::RequestFailed(e.to_string())
    }
}

/// Map a non-success response. 429 becomes `RateLimited`; otherwise the
/// provider's `error.message` is surfaced when the body carries one.
fn check_error(status: reqwest::StatusCode, body: &str) -> LlmError {
    if status.as_u16() == 429 {
        return LlmError::RateLimited;
    }
    match serde_json::from_str::<OaiErrorBody>(body) {
        Ok(parsed) => LlmError::RequestFailed(parsed.error.message),
        Err(_) if body.trim().is_empty() => LlmError::RequestFailed(format!("model error ({status})")),
        Err(_) => LlmError::RequestFailed(format!("{status}: {body}")),
    }
}

impl LlmProvider for HttpProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn complete(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompletionResponse, LlmError>> + Send + '_>> {
        Box::pin(self.complete_openai(request))
    }
}

/// Build a provider from the environment.
/// Reads `OPENAI_API_KEY` (or `XYLOH_LLM_API_KEY`), optionally `XYLOH_LLM_MODEL`
/// and `XYLOH_LLM_BASE_URL`. Returns `None` if no key is set.
pub fn from_env(timeout: Duration) -> Option<HttpProvider> {
    let api_key = std::env::var("OPENAI_API_KEY")
        .or_else(|_| std::env::var("XYLOH_LLM_API_KEY"))
        .ok()
        .filter(|k| !k.trim().is_empty())?;
    let model = std::env::var("XYLOH_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_owned());
    let base_url = std::env::var("XYLOH_LLM_BASE_URL").ok();
    Some(HttpProvider::new(model, api_key, base_url, timeout))
}
