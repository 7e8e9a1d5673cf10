use crate::chunking::{split_text, ChunkingConfig};
use crate::embeddings::Embedder;
use crate::error::PipelineError;
use crate::models::{join_chunk_text, Chunk};
use crate::prompts::{self, PromptTemplate};
use crate::traits::{GraphStore, LanguageModel};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const GRAPH_RETRIEVAL_K: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type", default = "default_node_type")]
    pub kind: String,
}

fn default_node_type() -> String {
    "Entity".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphRelationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", default = "default_relationship_type")]
    pub kind: String,
}

fn default_relationship_type() -> String {
    "RELATED_TO".to_string()
}

/// Entities and relations extracted from one chunk, kept with that chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphDocument {
    pub source: Chunk,
    pub nodes: Vec<GraphNode>,
    pub relationships: Vec<GraphRelationship>,
}

#[derive(Debug, Deserialize)]
struct RawGraph {
    #[serde(default)]
    nodes: Vec<GraphNode>,
    #[serde(default)]
    relationships: Vec<GraphRelationship>,
}

/// Parses the model's JSON reply. Surrounding prose or code fences are
/// ignored; duplicate nodes are merged and relationships whose endpoints are
/// not listed nodes are dropped.
pub fn parse_graph_reply(reply: &str, source: Chunk) -> Result<GraphDocument, PipelineError> {
    let (start, end) = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(PipelineError::GraphExtraction(format!(
                "reply for chunk {} contains no JSON object",
                source.index
            )))
        }
    };

    let raw: RawGraph = serde_json::from_str(&reply[start..=end]).map_err(|error| {
        PipelineError::GraphExtraction(format!("chunk {}: {error}", source.index))
    })?;

    let mut seen = HashSet::new();
    let nodes = raw
        .nodes
        .into_iter()
        .map(|node| GraphNode {
            id: node.id.trim().to_string(),
            kind: node.kind.trim().to_string(),
        })
        .filter(|node| !node.id.is_empty() && seen.insert(node.id.clone()))
        .collect::<Vec<_>>();

    let relationships = raw
        .relationships
        .into_iter()
        .map(|relationship| GraphRelationship {
            source: relationship.source.trim().to_string(),
            target: relationship.target.trim().to_string(),
            kind: relationship.kind.trim().to_string(),
        })
        .filter(|relationship| {
            seen.contains(&relationship.source) && seen.contains(&relationship.target)
        })
        .collect();

    Ok(GraphDocument {
        source,
        nodes,
        relationships,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphBuildReport {
    pub chunks: usize,
    pub nodes: usize,
    pub relationships: usize,
}

/// Builds a knowledge graph from document text and answers questions over it.
pub struct KnowledgeGraph<L, E, G>
where
    L: LanguageModel,
    E: Embedder,
    G: GraphStore,
{
    model: L,
    embedder: E,
    store: G,
    chunking: ChunkingConfig,
}

impl<L, E, G> KnowledgeGraph<L, E, G>
where
    L: LanguageModel,
    E: Embedder,
    G: GraphStore,
{
    pub fn new(model: L, embedder: E, store: G) -> Self {
        Self {
            model,
            embedder,
            store,
            chunking: ChunkingConfig::knowledge_graph(),
        }
    }

    pub fn with_chunking(mut self, chunking: ChunkingConfig) -> Self {
        self.chunking = chunking;
        self
    }

    pub async fn extract(&self, text: &str) -> Result<Vec<GraphDocument>, PipelineError> {
        let template = PromptTemplate::new(prompts::GRAPH_EXTRACTION);
        let mut documents = Vec::new();

        for chunk in split_text(text, self.chunking)? {
            let prompt = template.render(&[("text", chunk.text.as_str())])?;
            let reply = self.model.complete(&prompt).await?;
            documents.push(parse_graph_reply(&reply, chunk)?);
        }

        Ok(documents)
    }

    pub async fn build(&self, text: &str) -> Result<GraphBuildReport, PipelineError> {
        if text.trim().is_empty() {
            return Err(PipelineError::MissingInput("document has no text".to_string()));
        }

        self.store.verify_connectivity().await?;

        let documents = self.extract(text).await?;
        let texts = documents
            .iter()
            .map(|document| document.source.text.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embedder.embed_documents(&texts).await?;

        if let Some(dimensions) = embeddings.first().map(Vec::len) {
            self.store.ensure_vector_index(dimensions).await?;
        }
        self.store.add_graph_documents(&documents, &embeddings).await?;

        let report = GraphBuildReport {
            chunks: documents.len(),
            nodes: documents.iter().map(|document| document.nodes.len()).sum(),
            relationships: documents
                .iter()
                .map(|document| document.relationships.len())
                .sum(),
        };
        tracing::info!(
            chunks = report.chunks,
            nodes = report.nodes,
            relationships = report.relationships,
            "knowledge graph stored"
        );
        Ok(report)
    }

    pub async fn answer(&self, question: &str) -> Result<String, PipelineError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PipelineError::MissingInput("question is empty".to_string()));
        }

        let query_vector = self.embedder.embed_query(question).await?;
        let hits = self
            .store
            .similarity_search(&query_vector, GRAPH_RETRIEVAL_K)
            .await?;
        let context = join_chunk_text(&hits, "\n");

        let prompt = PromptTemplate::new(prompts::GRAPH_QUESTION_ANSWERING)
            .render(&[("context", context.as_str()), ("question", question)])?;
        Ok(self.model.complete(&prompt).await?)
    }
}
