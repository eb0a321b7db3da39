//! Embedding capability. One pinned model per deployment; vectors that do not match the
//! configured dimension are rejected before they reach the store.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{json, Value};

use mostrador_core::config::{EmbeddingConfig, EmbeddingProvider};

use crate::llm::{build_http_client, post_json_with_retry, LlmError};

const EMBEDDING_RETRIES: u32 = 1;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;
    fn dimensions(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;
}

#[derive(Clone, Debug)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    provider: EmbeddingProvider,
    base_url: String,
    model: String,
    dimensions: usize,
    api_key: Option<SecretString>,
}

impl HttpEmbedder {
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, LlmError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_owned());

        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            provider: config.provider,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: config.model.clone(),
            dimensions: config.dimensions,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint_and_body(&self, text: &str) -> (String, Value) {
        match self.provider {
            EmbeddingProvider::OpenAi => (
                format!("{}/embeddings", self.base_url),
                json!({ "model": self.model, "input": text }),
            ),
            EmbeddingProvider::Ollama => (
                format!("{}/api/embeddings", self.base_url),
                json!({ "model": self.model, "prompt": text }),
            ),
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let (url, body) = self.endpoint_and_body(text);
        let api_key = self.api_key.as_ref();
        let payload =
            post_json_with_retry(&self.client, &url, api_key, &body, EMBEDDING_RETRIES).await?;

        let raw = match self.provider {
            EmbeddingProvider::OpenAi => payload.pointer("/data/0/embedding"),
            EmbeddingProvider::Ollama => payload.get("embedding"),
        }
        .and_then(Value::as_array)
        .ok_or_else(|| LlmError::InvalidResponse("embedding vector missing".to_owned()))?;

        let vector = raw
            .iter()
            .map(|value| value.as_f64().map(|value| value as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| {
                LlmError::InvalidResponse("embedding has non-numeric values".to_owned())
            })?;

        if vector.len() != self.dimensions {
            return Err(LlmError::InvalidResponse(format!(
                "embedding model `{}` returned {} dimensions, expected {}",
                self.model,
                vector.len(),
                self.dimensions
            )));
        }

        Ok(l2_normalize(vector))
    }
}

/// Scales `vector` to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}
