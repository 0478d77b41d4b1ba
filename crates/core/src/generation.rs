use crate::error::GenerationError;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use url::Url;

pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[async_trait]
impl<T> Generator for Box<T>
where
    T: Generator + ?Sized,
{
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        (**self).generate(prompt).await
    }
}

fn http_client(agent: &str) -> Result<Client, GenerationError> {
    Client::builder()
        .user_agent(agent)
        .timeout(Duration::from_secs(120))
        .build()
        .map_err(|error| GenerationError::Unavailable(format!("http client: {error}")))
}

pub struct GeminiGenerator {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model: &str) -> Result<Self, GenerationError> {
        Self::with_base_url(DEFAULT_GEMINI_URL, api_key, model)
    }

    pub fn with_base_url(
        base_url: &str,
        api_key: impl Into<String>,
        model: &str,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            http: http_client("bangla-rag/gemini")?,
            endpoint: Url::parse(base_url)?
                .join(&format!("/v1beta/models/{model}:generateContent"))?,
            api_key: api_key.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }]
            }))
            .send()
            .await
            .map_err(|error| {
                GenerationError::Unavailable(format!("gemini request failed: {error}"))
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Unavailable(format!(
                "gemini returned {status}: {body}"
            )));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Failed(format!(
                "gemini returned {status}: {body}"
            )));
        }

        let body: GeminiResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode gemini response: {error}"))
        })?;

        let text = body
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(GenerationError::InvalidResponse(
                "gemini response has no text".to_string(),
            ));
        }

        Ok(text.trim().to_string())
    }
}

pub struct OllamaGenerator {
    http: Client,
    endpoint: Url,
    model: String,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, GenerationError> {
        Ok(Self {
            http: http_client("bangla-rag/ollama")?,
            endpoint: Url::parse(base_url)?.join("/api/generate")?,
            model: model.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }))
            .send()
            .await
            .map_err(|error| {
                GenerationError::Unavailable(format!(
                    "failed to reach ollama at {}: {error}",
                    self.endpoint
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(GenerationError::Unavailable(format!(
                "ollama endpoint {} returned 404",
                self.endpoint
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Failed(format!(
                "ollama returned {status}: {body}"
            )));
        }

        let body: OllamaResponse = response.json().await.map_err(|error| {
            GenerationError::InvalidResponse(format!("failed to decode ollama response: {error}"))
        })?;

        if !body.done {
            return Err(GenerationError::InvalidResponse(
                "ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.response.trim().to_string())
    }
}
