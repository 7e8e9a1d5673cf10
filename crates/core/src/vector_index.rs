use crate::embeddings::Embedder;
use crate::error::ServiceError;
use crate::models::{Chunk, ScoredChunk};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// Flat in-memory nearest-neighbour index over chunk embeddings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    model: String,
    dimensions: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            model: model.into(),
            dimensions,
            entries: Vec::new(),
        }
    }

    pub async fn build<E>(chunks: Vec<Chunk>, embedder: &E) -> Result<Self, ServiceError>
    where
        E: Embedder + ?Sized,
    {
        let texts = chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<_>>();
        let vectors = embedder.embed_documents(&texts).await?;

        let dimensions = vectors
            .first()
            .map(Vec::len)
            .or_else(|| embedder.dimensions())
            .unwrap_or_default();
        let mut index = Self::new(embedder.model(), dimensions);
        index.insert(chunks, vectors)?;

        tracing::debug!(
            model = %index.model,
            entries = index.len(),
            dimensions = index.dimensions,
            "vector index built"
        );
        Ok(index)
    }

    pub fn insert(&mut self, chunks: Vec<Chunk>, vectors: Vec<Vec<f32>>) -> Result<(), ServiceError> {
        if chunks.len() != vectors.len() {
            return Err(ServiceError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                vectors.len(),
                chunks.len()
            )));
        }

        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            if self.entries.is_empty() && self.dimensions == 0 {
                self.dimensions = vector.len();
            }
            if vector.len() != self.dimensions {
                return Err(ServiceError::Request(format!(
                    "embedding dimension {} != {}",
                    vector.len(),
                    self.dimensions
                )));
            }
            self.entries.push(IndexEntry { chunk, vector });
        }

        Ok(())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn similarity_search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredChunk>, ServiceError> {
        if self.entries.is_empty() {
            return Ok(Vec::new());
        }
        if query_vector.len() != self.dimensions {
            return Err(ServiceError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut hits = self
            .entries
            .iter()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query_vector, &entry.vector),
            })
            .collect::<Vec<_>>();

        hits.sort_by(|left, right| {
            right
                .score
                .partial_cmp(&left.score)
                .unwrap_or(Ordering::Equal)
                .then(left.chunk.index.cmp(&right.chunk.index))
        });
        hits.truncate(k);
        Ok(hits)
    }

    pub async fn search<E>(
        &self,
        embedder: &E,
        query: &str,
        k: usize,
    ) -> Result<Vec<ScoredChunk>, ServiceError>
    where
        E: Embedder + ?Sized,
    {
        let query_vector = embedder.embed_query(query).await?;
        self.similarity_search(&query_vector, k)
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();
    if left_norm == 0.0 || right_norm == 0.0 {
        0.0
    } else {
        dot / (left_norm * right_norm)
    }
}

/// Named indexes persisted as `<root>/<name>/index.json`.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn index_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(INDEX_FILE)
    }

    pub async fn save(&self, name: &str, index: &VectorIndex) -> Result<PathBuf, ServiceError> {
        let directory = self.root.join(name);
        tokio::fs::create_dir_all(&directory).await?;

        let path = directory.join(INDEX_FILE);
        let payload = serde_json::to_vec(index)?;
        tokio::fs::write(&path, payload).await?;

        tracing::info!(path = %path.display(), entries = index.len(), "saved vector index");
        Ok(path)
    }

    pub async fn load(&self, name: &str) -> Result<VectorIndex, ServiceError> {
        let path = self.index_path(name);
        let payload = match tokio::fs::read(&path).await {
            Ok(payload) => payload,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServiceError::NotReady(format!(
                    "no vector index at {}",
                    path.display()
                )));
            }
            Err(error) => return Err(error.into()),
        };
        Ok(serde_json::from_slice(&payload)?)
    }
}
