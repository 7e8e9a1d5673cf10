use crate::graph::GraphDocument;
use crate::models::ScoredChunk;
use crate::ServiceError;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, ServiceError>;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    fn model(&self) -> &str {
        (**self).model()
    }

    async fn complete(&self, prompt: &str) -> Result<String, ServiceError> {
        (**self).complete(prompt).await
    }
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn verify_connectivity(&self) -> Result<(), ServiceError>;

    async fn ensure_vector_index(&self, dimensions: usize) -> Result<(), ServiceError>;

    async fn add_graph_documents(
        &self,
        documents: &[GraphDocument],
        embeddings: &[Vec<f32>],
    ) -> Result<(), ServiceError>;

    async fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, ServiceError>;
}

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns encoded audio for `text`.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceError>;
}
