//! VLM interaction: send one page image and get its Markdown back.
//!
//! [`VisionOcrService`] is the seam the session talks to. The production
//! implementation, [`GroqOcrClient`], speaks the OpenAI-compatible
//! chat-completions protocol that Groq exposes: a single user turn carrying
//! the instruction text and the page as an inline `image_url`.
//!
//! The response text is returned verbatim. Nothing here retries: a failed
//! request becomes an [`OcrRequestError`] and the session decides what to do
//! with the page.

use crate::config::SessionConfig;
use crate::error::{Ocr2MdError, OcrRequestError};
use crate::pipeline::encode::EncodedPayload;
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Turns one encoded page image into text.
#[async_trait]
pub trait VisionOcrService: Send + Sync {
    /// Run OCR on `payload` with `model`, returning the model's raw text.
    async fn extract(&self, payload: &EncodedPayload, model: &str) -> Result<String, OcrRequestError>;
}

/// [`VisionOcrService`] backed by Groq's chat-completions endpoint.
pub struct GroqOcrClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    prompt: String,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
}

impl std::fmt::Debug for GroqOcrClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqOcrClient")
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

impl GroqOcrClient {
    /// Build a client from the session config.
    ///
    /// # Errors
    /// [`Ocr2MdError::MissingApiKey`] when no credential is configured.
    pub fn from_config(config: &SessionConfig) -> Result<Self, Ocr2MdError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or(Ocr2MdError::MissingApiKey)?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs))
            .user_agent(concat!("ocr2md/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Ocr2MdError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.completions_url(),
            api_key,
            prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout_secs: config.api_timeout_secs,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> OcrRequestError {
        if e.is_timeout() {
            OcrRequestError::Timeout {
                secs: self.timeout_secs,
            }
        } else {
            OcrRequestError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl VisionOcrService for GroqOcrClient {
    async fn extract(&self, payload: &EncodedPayload, model: &str) -> Result<String, OcrRequestError> {
        let start = Instant::now();
        let request = build_request(&self.prompt, payload, model, self.temperature, self.max_tokens);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(status_error(status, &headers, &body));
        }

        let text = parse_completion(&body)?;
        debug!(
            "OCR response: {} chars in {}ms",
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

fn build_request<'a>(
    prompt: &'a str,
    payload: &'a EncodedPayload,
    model: &'a str,
    temperature: f32,
    max_tokens: u32,
) -> ChatRequest<'a> {
    ChatRequest {
        model,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text { text: prompt },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: payload.as_str(),
                    },
                },
            ],
        }],
        temperature,
        max_tokens,
    }
}

/// Extract the first choice's text. A `null` content is an empty answer,
/// not an error.
fn parse_completion(body: &str) -> Result<String, OcrRequestError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| OcrRequestError::MalformedResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| OcrRequestError::MalformedResponse("response has no choices".into()))
}

fn status_error(status: StatusCode, headers: &HeaderMap, body: &str) -> OcrRequestError {
    let detail = error_detail(body);
    match status.as_u16() {
        401 | 403 => OcrRequestError::Auth {
            status: status.as_u16(),
            detail,
        },
        429 => OcrRequestError::RateLimited {
            retry_after_secs: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok()),
        },
        code => OcrRequestError::Api {
            status: code,
            detail,
        },
    }
}

/// Prefer the API's `error.message`; fall back to a clipped raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(300).collect())
}
