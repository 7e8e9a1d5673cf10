pub mod analysis;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod llm;
pub mod models;
pub mod prompts;
pub mod rfp;
pub mod speech;
pub mod stores;
pub mod traits;
pub mod vector_index;

pub use analysis::{analyze, chat, DocumentQa, ReportKind};
pub use chunking::{split_text, ChunkingConfig};
pub use config::{require_key, ModelSettings, Provider};
pub use embeddings::{
    known_dimensions, CharacterNgramEmbedder, Embedder, GeminiEmbedder, OpenAiEmbedder,
    DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IngestError, PipelineError, ServiceError};
pub use extractor::{
    digest_bytes, extract_bytes, extract_document, DocxExtractor, LopdfExtractor, PageText,
    PdfExtractor,
};
pub use graph::{parse_graph_reply, GraphBuildReport, GraphDocument, KnowledgeGraph};
pub use llm::{GeminiClient, OpenAiClient};
pub use models::{Chunk, DocumentKind, ExtractedDocument, ScoredChunk};
pub use prompts::PromptTemplate;
pub use rfp::{RfpReview, RfpReviewer};
pub use speech::{pdf_to_speech, speech_pieces, synthesize_long_text, ElevenLabsClient};
pub use stores::Neo4jStore;
pub use traits::{GraphStore, LanguageModel, SpeechSynthesizer};
pub use vector_index::{IndexStore, VectorIndex};
