use crate::config::{require_key, GEMINI_BASE_URL, GOOGLE_API_KEY, OPENAI_API_KEY, OPENAI_BASE_URL};
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

const GEMINI_BATCH_LIMIT: usize = 100;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model(&self) -> &str;

    /// Vector width, when it is known before the first call.
    fn dimensions(&self) -> Option<usize> {
        known_dimensions(self.model())
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ServiceError::backend(self.model(), "no embedding returned for query"))
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn model(&self) -> &str {
        (**self).model()
    }

    fn dimensions(&self) -> Option<usize> {
        (**self).dimensions()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        (**self).embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        (**self).embed_query(text).await
    }
}

/// Output width of the hosted models' default configuration.
pub fn known_dimensions(model: &str) -> Option<usize> {
    match model.trim_start_matches("models/") {
        "text-embedding-004" | "text-embedding-005" | "embedding-001" => Some(768),
        "text-embedding-3-small" | "text-embedding-ada-002" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model(&self) -> &str {
        "char-trigram"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions.max(1))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// Generative Language API embeddings (`batchEmbedContents`).
pub struct GeminiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(api_key: Option<&str>, model: impl Into<String>) -> Result<Self, ServiceError> {
        Ok(Self {
            client: Client::new(),
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: require_key(api_key, GOOGLE_API_KEY)?,
            model: model.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        task_type: &'static str,
    ) -> Result<Vec<Vec<f32>>, ServiceError> {
        let model = self.model_path();
        let url = Url::parse_with_params(
            &format!("{}/{}:batchEmbedContents", self.base_url, model),
            &[("key", self.api_key.as_str())],
        )?;

        let request = GeminiBatchRequest {
            requests: texts
                .iter()
                .map(|text| GeminiEmbedRequest {
                    model: model.clone(),
                    content: GeminiContent {
                        parts: vec![GeminiPart { text: text.clone() }],
                    },
                    task_type,
                })
                .collect(),
        };

        let response = self.client.post(url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::backend("gemini", format!("{status}: {body}")));
        }

        let payload: GeminiBatchResponse = response.json().await?;
        gemini_vectors(payload, texts.len())
    }

    async fn embed_with_task(
        &self,
        texts: &[String],
        task_type: &'static str,
    ) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(GEMINI_BATCH_LIMIT) {
            vectors.extend(self.embed_batch(batch, task_type).await?);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        self.embed_with_task(texts, "RETRIEVAL_DOCUMENT").await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut vectors = self
            .embed_with_task(&[text.to_string()], "RETRIEVAL_QUERY")
            .await?;
        vectors
            .pop()
            .ok_or_else(|| ServiceError::backend("gemini", "no embedding returned for query"))
    }
}

#[derive(Debug, Serialize)]
struct GeminiBatchRequest {
    requests: Vec<GeminiEmbedRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiContent,
    task_type: &'static str,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiBatchResponse {
    #[serde(default)]
    embeddings: Vec<GeminiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedding {
    values: Vec<f32>,
}

fn gemini_vectors(
    payload: GeminiBatchResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ServiceError> {
    if payload.embeddings.len() != expected {
        return Err(ServiceError::backend(
            "gemini",
            format!(
                "embedding count {} doesn't match input count {}",
                payload.embeddings.len(),
                expected
            ),
        ));
    }
    Ok(payload
        .embeddings
        .into_iter()
        .map(|embedding| embedding.values)
        .collect())
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: Option<&str>, model: impl Into<String>) -> Result<Self, ServiceError> {
        Ok(Self {
            client: Client::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: require_key(api_key, OPENAI_API_KEY)?,
            model: model.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &str {
        &self.model
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&OpenAiEmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::backend("openai", format!("{status}: {body}")));
        }

        let payload: OpenAiEmbeddingResponse = response.json().await?;
        openai_vectors(payload, texts.len())
    }
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    #[serde(default)]
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

fn openai_vectors(
    mut payload: OpenAiEmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ServiceError> {
    if payload.data.len() != expected {
        return Err(ServiceError::backend(
            "openai",
            format!(
                "embedding count {} doesn't match input count {}",
                payload.data.len(),
                expected
            ),
        ));
    }
    payload.data.sort_by_key(|item| item.index);
    Ok(payload.data.into_iter().map(|item| item.embedding).collect())
}
