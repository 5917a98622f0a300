//! Text generation against the configured backend.
//!
//! Two wire protocols are supported and normalized to one capability,
//! [`TextGenerator::generate`]:
//!
//! - **Local**: `POST {endpoint}/api/generate` with a single prompt, answer in
//!   the `response` field.
//! - **Hosted**: `POST {endpoint}/chat/completions` with one user message and a
//!   bearer token, answer in `choices[0].message.content`.
//!
//! Each variant owns its request and response marshaling, so callers never see
//! the difference.

use crate::activity_log::ActivityLog;
use crate::error::GenerationError;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

/// The generation backend selected for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backend {
    Local {
        endpoint: String,
        model: String,
    },
    Hosted {
        endpoint: String,
        api_key: String,
        model: String,
        stream: bool,
    },
}

#[derive(Debug, Deserialize)]
struct LocalResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    delta: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

impl Backend {
    pub fn endpoint(&self) -> &str {
        match self {
            Backend::Local { endpoint, .. } | Backend::Hosted { endpoint, .. } => endpoint,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Backend::Local { model, .. } | Backend::Hosted { model, .. } => model,
        }
    }

    /// Full URL the request is posted to.
    pub fn url(&self) -> String {
        let base = self.endpoint().trim_end_matches('/');
        match self {
            Backend::Local { .. } => format!("{}/api/generate", base),
            Backend::Hosted { .. } => format!("{}/chat/completions", base),
        }
    }

    pub fn request_body(&self, prompt: &str) -> Value {
        match self {
            Backend::Local { model, .. } => json!({
                "model": model,
                "prompt": prompt,
                "stream": false
            }),
            Backend::Hosted { model, stream, .. } => json!({
                "model": model,
                "messages": [
                    {
                        "role": "user",
                        "content": prompt
                    }
                ],
                "stream": stream
            }),
        }
    }

    /// Extracts the generated text, or `None` when there is none.
    pub fn extract_text(&self, body: &str) -> Option<String> {
        let text = match self {
            Backend::Local { .. } => serde_json::from_str::<LocalResponse>(body)
                .ok()
                .and_then(|r| r.response),
            Backend::Hosted { stream, .. } => {
                match serde_json::from_str::<ChatResponse>(body) {
                    Ok(chat) => chat
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.message)
                        .and_then(|message| message.content),
                    Err(_) if *stream => collect_stream_deltas(body),
                    Err(_) => None,
                }
            }
        };

        text.filter(|t| !t.trim().is_empty())
    }

    /// Short label for display, e.g. `local (llama3.2 @ http://localhost:11434)`.
    pub fn describe(&self) -> String {
        let kind = match self {
            Backend::Local { .. } => "local",
            Backend::Hosted { .. } => "hosted",
        };
        format!("{} ({} @ {})", kind, self.model(), self.endpoint())
    }
}

/// Reassembles a server-sent-events body from a streaming chat backend.
fn collect_stream_deltas(body: &str) -> Option<String> {
    let mut text = String::new();
    for line in body.lines() {
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data == "[DONE]" {
            break;
        }
        if let Ok(chunk) = serde_json::from_str::<ChatResponse>(data) {
            for choice in chunk.choices {
                if let Some(content) = choice.delta.and_then(|d| d.content) {
                    text.push_str(&content);
                }
            }
        }
    }
    (!text.is_empty()).then_some(text)
}

/// Anything that can turn a prompt into raw text.
///
/// `Ok(None)` means the backend answered without usable text; the caller
/// decides whether that is worth another attempt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, GenerationError>;
}

/// [`TextGenerator`] speaking to a real [`Backend`] over HTTP.
pub struct BackendClient {
    backend: Backend,
    http: Box<dyn HttpClient>,
    log: ActivityLog,
}

impl BackendClient {
    pub fn new(backend: Backend, log: ActivityLog) -> Self {
        Self::with_http(backend, Box::new(ReqwestHttpClient::new()), log)
    }

    /// Creates a client with an injected HTTP implementation (for testing).
    pub fn with_http(backend: Backend, http: Box<dyn HttpClient>, log: ActivityLog) -> Self {
        Self { backend, http, log }
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }
}

#[async_trait]
impl TextGenerator for BackendClient {
    async fn generate(&self, prompt: &str) -> Result<Option<String>, GenerationError> {
        let url = self.backend.url();
        let body = self.backend.request_body(prompt);

        let bearer;
        let mut headers: Vec<(&str, &str)> = vec![("content-type", "application/json")];
        if let Backend::Hosted { api_key, .. } = &self.backend {
            bearer = format!("Bearer {}", api_key);
            headers.push(("authorization", bearer.as_str()));
        }

        let response = match self.http.post_json(&url, &headers, &body).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Request to {} failed: {}", url, e);
                self.log.record(&format!("POST {} failed: {}", url, e));
                return Err(GenerationError::BackendUnreachable {
                    endpoint: url,
                    detail: e.to_string(),
                });
            }
        };

        debug!("POST {} -> {}", url, response.status);
        self.log.record(&format!("POST {} -> {}", url, response.status));

        if !response.is_success() {
            return Err(GenerationError::BackendUnreachable {
                endpoint: url,
                detail: format!("HTTP status {}: {}", response.status, response.body.trim()),
            });
        }

        let text = self.backend.extract_text(&response.body);
        if text.is_none() {
            warn!("Backend at {} returned no text", url);
        }
        Ok(text)
    }
}
