//! Live summarizer backed by an OpenAI-compatible chat completions API.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::client::{Summarizer, SummaryFuture};
use super::prompt::summary_prompt;
use crate::error::SummarizerError;
use crate::Result;

/// Default API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the API base URL.
pub const API_BASE_ENV: &str = "CODEBRIEF_API_BASE";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Connection settings for the chat completions endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL, without the `/chat/completions` suffix.
    pub api_base: String,
    /// Bearer token.
    pub api_key: String,
    /// Completion length limit.
    pub max_tokens: u32,
}

impl OpenAiConfig {
    /// Read settings from `OPENAI_API_KEY` and `CODEBRIEF_API_BASE`.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is set.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                SummarizerError::MissingCredentials(format!("{API_KEY_ENV} is not set"))
            })?;
        let api_base =
            std::env::var(API_BASE_ENV).unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        Ok(Self {
            api_base,
            api_key,
            max_tokens: 1024,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

/// Summarizer that posts each file to `/chat/completions`.
pub struct OpenAiSummarizer {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiSummarizer {
    /// Create a summarizer with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SummarizerError::from)?;
        Ok(Self { client, config })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl OpenAiSummarizer {
    async fn request_summary(&self, content: &str, model: &str) -> Result<String> {
        let prompt = summary_prompt(content);
        let body = ChatRequest {
            model,
            max_tokens: self.config.max_tokens,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(SummarizerError::from)?;

        let status = response.status();
        let text = response.text().await.map_err(SummarizerError::from)?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(SummarizerError::Status {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        parse_summary(&text)
    }
}

impl Summarizer for OpenAiSummarizer {
    fn summarize<'a>(&'a self, content: &'a str, model: &'a str) -> SummaryFuture<'a> {
        Box::pin(self.request_summary(content, model))
    }
}

/// Extract the first choice's text from a chat completions response body.
fn parse_summary(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| SummarizerError::MalformedResponse(format!("invalid JSON: {e}")))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SummarizerError::MalformedResponse("no summary text".to_string()).into())
}
