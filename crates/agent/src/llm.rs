//! Text-completion capability. Handlers only ever see [`LlmClient`]; the HTTP client
//! speaks the OpenAI-compatible chat API (OpenAI, Groq) and Ollama's generate API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use mostrador_core::config::{LlmConfig, LlmProvider};

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LlmError {
    #[error("model call timed out: {0}")]
    Timeout(String),
    #[error("model provider unavailable: {0}")]
    Unavailable(String),
    #[error("model returned an unusable response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// Timeouts and unavailability are worth one more attempt; a bad payload is not.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Unavailable(_))
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

#[derive(Clone, Debug)]
pub struct HttpLlmClient {
    client: reqwest::Client,
    provider: LlmProvider,
    base_url: String,
    model: String,
    api_key: Option<SecretString>,
    max_retries: u32,
}

impl HttpLlmClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = build_http_client(config.timeout_secs)?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_owned());

        Ok(Self {
            client,
            provider: config.provider,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint_and_body(&self, request: &CompletionRequest) -> (String, Value) {
        match self.provider {
            LlmProvider::OpenAi | LlmProvider::Groq => (
                format!("{}/chat/completions", self.base_url),
                json!({
                    "model": self.model,
                    "messages": [{ "role": "user", "content": request.prompt }],
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                }),
            ),
            LlmProvider::Ollama => (
                format!("{}/api/generate", self.base_url),
                json!({
                    "model": self.model,
                    "prompt": request.prompt,
                    "stream": false,
                    "options": {
                        "num_predict": request.max_tokens,
                        "temperature": request.temperature,
                    },
                }),
            ),
        }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let (url, body) = self.endpoint_and_body(request);
        let payload =
            post_json_with_retry(&self.client, &url, self.api_key.as_ref(), &body, self.max_retries)
                .await?;

        let text = match self.provider {
            LlmProvider::OpenAi | LlmProvider::Groq => {
                payload.pointer("/choices/0/message/content").and_then(Value::as_str)
            }
            LlmProvider::Ollama => payload.get("response").and_then(Value::as_str),
        };

        match text.map(str::trim) {
            Some(text) if !text.is_empty() => Ok(text.to_owned()),
            _ => Err(LlmError::InvalidResponse("completion text missing or empty".to_owned())),
        }
    }
}

pub(crate) fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .build()
        .map_err(|error| LlmError::Unavailable(format!("failed to build HTTP client: {error}")))
}

fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::INTERNAL_SERVER_ERROR
        || status == StatusCode::BAD_GATEWAY
        || status == StatusCode::SERVICE_UNAVAILABLE
        || status == StatusCode::GATEWAY_TIMEOUT
}

fn classify_send_error(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        LlmError::Timeout(error.to_string())
    } else {
        LlmError::Unavailable(error.to_string())
    }
}

/// POSTs `body` and decodes a JSON reply. Transient failures are retried up to
/// `max_retries` times with a linear backoff.
pub(crate) async fn post_json_with_retry(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&SecretString>,
    body: &Value,
    max_retries: u32,
) -> Result<Value, LlmError> {
    let mut last_error = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let backoff = Duration::from_millis(500 * u64::from(attempt));
            warn!(
                event_name = "llm.request.retry",
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "retrying model request after transient error"
            );
            tokio::time::sleep(backoff).await;
        }

        let mut builder = client.post(url).json(body);
        if let Some(key) = api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(error) => {
                let error = classify_send_error(error);
                if error.is_transient() && attempt < max_retries {
                    last_error = Some(error);
                    continue;
                }
                return Err(error);
            }
        };

        let status = response.status();
        debug!(event_name = "llm.response.received", status = %status, attempt, "model response");

        if status.is_success() {
            return response.json::<Value>().await.map_err(|error| {
                LlmError::InvalidResponse(format!("failed to decode response body: {error}"))
            });
        }

        let body = response.text().await.unwrap_or_default();
        let error = LlmError::Unavailable(format!("provider returned {status}: {body}"));
        if is_transient_status(status) && attempt < max_retries {
            last_error = Some(error);
            continue;
        }
        if is_transient_status(status) {
            return Err(error);
        }
        return Err(LlmError::InvalidResponse(format!("provider returned {status}: {body}")));
    }

    Err(last_error
        .unwrap_or_else(|| LlmError::Unavailable("request failed after retries".to_owned())))
}

/// Pulls a JSON object out of a model reply: the whole reply, a fenced ```json block,
/// or the outermost `{...}` span.
pub fn extract_json_object(reply: &str) -> Option<Value> {
    let trimmed = reply.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    let fenced = trimmed
        .split("```json")
        .nth(1)
        .or_else(|| trimmed.split("```").nth(1))
        .and_then(|rest| rest.split("```").next());
    if let Some(block) = fenced {
        if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(block.trim()) {
            return Some(value);
        }
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(value @ Value::Object(_)) => Some(value),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use serde_json::json;

    use mostrador_core::config::{LlmConfig, LlmProvider};

    use super::{extract_json_object, CompletionRequest, HttpLlmClient, LlmError};

    fn config(provider: LlmProvider, base_url: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: Some(SecretString::from("test-key".to_owned())),
            base_url: base_url.map(str::to_owned),
            model: "test-model".to_owned(),
            timeout_secs: 5,
            max_retries: 1,
            max_tokens: 100,
            temperature: 0.2,
        }
    }

    #[test]
    fn openai_compatible_request_shape() {
        let client = HttpLlmClient::from_config(&config(LlmProvider::Groq, None)).expect("client");
        let (url, body) = client.endpoint_and_body(&CompletionRequest {
            prompt: "hola".to_owned(),
            max_tokens: 50,
            temperature: 0.3,
        });
        assert_eq!(url, "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(body["messages"][0]["content"], "hola");
        assert_eq!(body["max_tokens"], 50);
    }

    #[test]
    fn ollama_request_shape_trims_trailing_slash() {
        let client =
            HttpLlmClient::from_config(&config(LlmProvider::Ollama, Some("http://llm:11434/")))
                .expect("client");
        let (url, body) = client.endpoint_and_body(&CompletionRequest {
            prompt: "hola".to_owned(),
            max_tokens: 50,
            temperature: 0.3,
        });
        assert_eq!(url, "http://llm:11434/api/generate");
        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 50);
    }

    #[test]
    fn transient_classification() {
        assert!(LlmError::Timeout("t".into()).is_transient());
        assert!(LlmError::Unavailable("u".into()).is_transient());
        assert!(!LlmError::InvalidResponse("bad".into()).is_transient());
    }

    #[test]
    fn json_extraction_accepts_fenced_and_embedded_objects() {
        let plain = extract_json_object(r#"{"items": []}"#).expect("plain");
        assert_eq!(plain, json!({"items": []}));

        let fenced =
            extract_json_object("Aquí está:\n```json\n{\"rating\": 5}\n```\n").expect("fenced");
        assert_eq!(fenced["rating"], 5);

        let embedded = extract_json_object("Sure! {\"rating\": 2} hope it helps").expect("span");
        assert_eq!(embedded["rating"], 2);

        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("[1, 2]").is_none());
    }
}
