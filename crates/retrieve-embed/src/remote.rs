//! HTTP embedding backends.

use anyhow::{anyhow, ensure, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use retrieve_core::config::{LocalEmbeddingSettings, RemoteEmbeddingSettings};
use retrieve_core::traits::EmbeddingBackend;

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiBackend {
    client: reqwest::Client,
    name: String,
    url: String,
    api_key: String,
    model: String,
    dim: usize,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

impl OpenAiBackend {
    pub fn new(client: reqwest::Client, settings: &RemoteEmbeddingSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| anyhow!("remote embedding backend requires an api_key"))?;
        Ok(Self {
            client,
            name: format!("openai:{}", settings.model),
            url: join_url(&settings.base_url, "embeddings"),
            api_key,
            model: settings.model.clone(),
            dim: settings.dimension,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = OpenAiRequest { model: &self.model, input: text, dimensions: self.dim };
        let resp: OpenAiResponse = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?
            .error_for_status()?
            .json()
            .await?;
        let first = resp.data.into_iter().next().ok_or_else(|| anyhow!("empty embedding response"))?;
        Ok(first.embedding)
    }
}

/// Self-hosted Ollama `/api/embeddings` endpoint.
pub struct OllamaBackend {
    client: reqwest::Client,
    name: String,
    url: String,
    model: String,
    dim: usize,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

impl OllamaBackend {
    pub fn new(client: reqwest::Client, settings: &LocalEmbeddingSettings) -> Self {
        Self {
            client,
            name: format!("ollama:{}", settings.model),
            url: join_url(&settings.base_url, "api/embeddings"),
            model: settings.model.clone(),
            dim: settings.dimension,
        }
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = OllamaRequest { model: &self.model, prompt: text };
        let resp: OllamaResponse = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?
            .error_for_status()?
            .json()
            .await?;
        ensure!(!resp.embedding.is_empty(), "ollama returned no embedding");
        Ok(resp.embedding)
    }
}
