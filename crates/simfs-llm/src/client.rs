//! OpenAI-compatible chat-completions client.
//!
//! The blocking variant returns the full body string; the streaming variant
//! hands back a [`StreamBuffer`] immediately and runs the HTTP exchange on a
//! detached task that owns the only writer handle. Both variants post the
//! same JSON body; streaming adds the `stream` flag and an
//! `Accept: text/event-stream` header.

use std::sync::Arc;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::buffer::StreamBuffer;
use crate::prompt;
use crate::request::{GenerationRequest, Generator};
use crate::sse::{delta_content, SseScanner, DONE_PAYLOAD};

/// Default vendor chat-completions URL.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Environment variable supplying the bearer token.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const TEMPERATURE: f64 = 0.7;
const MAX_TOKENS: u32 = 2048;

/// Errors from the blocking generation path.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The HTTP exchange itself failed.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered with an error status or error body.
    #[error("API error: {0}")]
    Api(String),

    /// A 2xx response that does not carry the expected fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The client's runtime could not be built.
    #[error("runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

/// Chat-completions client owning its own transport runtime.
pub struct LlmClient {
    endpoint: String,
    http: reqwest::Client,
    runtime: Runtime,
}

impl LlmClient {
    /// Build a client for `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, LlmError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("simfs-llm")
            .enable_all()
            .build()?;
        Ok(LlmClient {
            endpoint: endpoint.into(),
            http: reqwest::Client::new(),
            runtime,
        })
    }

    /// The configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body(request: &GenerationRequest, stream: bool) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": prompt::SYSTEM_PROMPT},
                {"role": "user", "content": prompt::user_prompt(request)},
            ],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
        });
        if stream {
            body["stream"] = Value::Bool(true);
        }
        body
    }

    fn post(&self, body: &Value, streaming: bool) -> reqwest::RequestBuilder {
        let mut builder = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(body);
        if streaming {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        }
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            builder = builder.bearer_auth(key);
        }
        builder
    }

    /// Generate the full file body, blocking until the response arrives.
    pub fn generate(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let body = Self::request_body(request, false);
        let builder = self.post(&body, false);

        self.runtime.block_on(async move {
            let response = builder.send().await?;
            if !response.status().is_success() {
                return Err(LlmError::Api(format!(
                    "HTTP {} from LLM endpoint",
                    response.status()
                )));
            }

            let payload: Value = response.json().await?;
            if let Some(message) = payload
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
            {
                return Err(LlmError::Api(message.to_string()));
            }

            payload
                .get("choices")
                .and_then(|c| c.get(0))
                .and_then(|c| c.get("message"))
                .and_then(|m| m.get("content"))
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    LlmError::MalformedResponse("missing choices[0].message.content".to_string())
                })
        })
    }
}

impl Generator for LlmClient {
    fn generate_stream(&self, request: GenerationRequest) -> Arc<StreamBuffer> {
        let buffer = Arc::new(StreamBuffer::new());
        let writer = Arc::clone(&buffer);

        let body = Self::request_body(&request, true);
        let builder = self.post(&body, true);
        let path = request.path;

        self.runtime.spawn(async move {
            debug!("generation stream starting for {}", path);
            let mut response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    writer.mark_error(format!("request failed: {}", e));
                    return;
                }
            };

            if !response.status().is_success() {
                writer.mark_error(format!("HTTP {} from LLM endpoint", response.status()));
                return;
            }

            let mut scanner = SseScanner::new();
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        for payload in scanner.push(&chunk) {
                            if payload == DONE_PAYLOAD {
                                writer.mark_complete();
                            } else if let Some(text) = delta_content(&payload) {
                                writer.append(text.as_bytes());
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        writer.mark_error(format!("stream transport failed: {}", e));
                        return;
                    }
                }
            }

            // Some endpoints close the body without an explicit [DONE].
            if !writer.is_complete() {
                writer.mark_complete();
            }
            debug!(
                "generation stream for {} finished with {} bytes",
                path,
                writer.total_size()
            );
        });

        buffer
    }
}
