use crate::embeddings::Embedder;
use crate::error::{ConfigError, EmbedError, GenerationError};
use crate::generation::Generator;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

pub const GEMINI_EMBEDDING_DIMENSIONS: usize = 768;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_GENERATION_MODEL: &str = "gemini-1.5-flash-latest";
const DEFAULT_EMBEDDING_MODEL: &str = "embedding-001";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub endpoint: String,
    pub generation_model: String,
    pub embedding_model: String,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    endpoint: String,
    api_key: String,
    generation_model: String,
    embedding_model: String,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if config.generation_model.trim().is_empty() {
            return Err(ConfigError::MissingModel("generation model".to_string()));
        }
        if config.embedding_model.trim().is_empty() {
            return Err(ConfigError::MissingModel("embedding model".to_string()));
        }

        let endpoint = Url::parse(&config.endpoint)?;

        Ok(Self {
            client: Client::new(),
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key,
            generation_model: config.generation_model,
            embedding_model: config.embedding_model,
        })
    }
}

#[async_trait]
impl Generator for GeminiBackend {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.endpoint, self.generation_model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [
                    {
                        "role": "user",
                        "parts": [{ "text": prompt }]
                    }
                ]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GenerationError::BackendResponse {
                backend: "gemini".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        answer_from_payload(&payload)
    }
}

#[async_trait]
impl Embedder for GeminiBackend {
    fn dimensions(&self) -> usize {
        GEMINI_EMBEDDING_DIMENSIONS
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:embedContent",
                self.endpoint, self.embedding_model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "model": format!("models/{}", self.embedding_model),
                "content": { "parts": [{ "text": text }] }
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(EmbedError::BackendResponse {
                backend: "gemini".to_string(),
                details: response.status().to_string(),
            });
        }

        let payload: Value = response.json().await?;
        vector_from_payload(&payload)
    }
}

fn answer_from_payload(payload: &Value) -> Result<String, GenerationError> {
    let answer = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.pointer("/text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if answer.trim().is_empty() {
        return Err(GenerationError::MalformedResponse(
            "no candidate text in generateContent payload".to_string(),
        ));
    }

    Ok(answer)
}

fn vector_from_payload(payload: &Value) -> Result<Vec<f32>, EmbedError> {
    let values = payload
        .pointer("/embedding/values")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            EmbedError::MalformedResponse(
                "no embedding values in embedContent payload".to_string(),
            )
        })?;

    Ok(values
        .iter()
        .map(|value| value.as_f64().unwrap_or(0.0) as f32)
        .collect())
}
