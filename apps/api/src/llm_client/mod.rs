/// LLM Client — the single point of entry for all completion calls in Parley.
///
/// ARCHITECTURAL RULE: No other module may call the Mistral API directly.
/// All LLM interactions MUST go through this module.
///
/// Model: mistral-large-latest (hardcoded — do not make configurable to
/// prevent drift between environments)
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::conversation::Turn;

pub mod prompts;

const MISTRAL_API_URL: &str = "https://api.mistral.ai/v1/chat/completions";
/// The model used for all LLM calls in Parley.
pub const MODEL: &str = "mistral-large-latest";
const TEMPERATURE: f32 = 0.4;
const MAX_TOKENS: u32 = 2048;
const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("completion service returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("malformed completion response: {0}")]
    Malformed(String),
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionParams {
    pub model: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            model: MODEL,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'static str,
    messages: &'a [Turn],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Seam between the prompt composer and the completion service, so tests can
/// substitute a scripted backend for the real HTTP client.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Sends the ordered message sequence (system turn first) and returns the
    /// assistant text of the first candidate.
    async fn complete(
        &self,
        messages: &[Turn],
        params: &CompletionParams,
    ) -> Result<String, LlmError>;
}

/// The production backend: a thin wrapper over the Mistral chat completions
/// endpoint. One request, one response — no retries; the caller decides
/// whether a failed exchange is worth re-running.
#[derive(Clone)]
pub struct MistralClient {
    client: Client,
    api_key: String,
}

impl MistralClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }
}

#[async_trait]
impl CompletionBackend for MistralClient {
    async fn complete(
        &self,
        messages: &[Turn],
        params: &CompletionParams,
    ) -> Result<String, LlmError> {
        let request_body = ChatRequest {
            model: params.model,
            messages,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(MISTRAL_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = response.text().await?;
        let content = extract_content(&body)?;

        debug!("LLM call succeeded: {} chars of assistant text", content.len());

        Ok(content)
    }
}

/// Pulls the first candidate's text out of a raw chat completions body.
/// A body without `choices` (or with an empty list) is malformed — partial
/// or garbage text is never returned.
fn extract_content(body: &str) -> Result<String, LlmError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Malformed(e.to_string()))?;

    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| LlmError::Malformed("response contained no choices".to_string()))
}
