use crate::extractor::PageText;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension().and_then(|ext| ext.to_str())?;
        if extension.eq_ignore_ascii_case("pdf") {
            Some(Self::Pdf)
        } else if extension.eq_ignore_ascii_case("docx") {
            Some(Self::Docx)
        } else {
            None
        }
    }
}

/// Flattened text of one uploaded or on-disk document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub source: String,
    pub kind: DocumentKind,
    pub checksum: String,
    pub extracted_at: DateTime<Utc>,
    pub pages: Vec<PageText>,
}

impl ExtractedDocument {
    /// Page (or paragraph) texts joined in their original order.
    pub fn text(&self) -> String {
        concatenate_pages(&self.pages)
    }

    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|page| page.text.trim().is_empty())
    }
}

pub fn concatenate_pages(pages: &[PageText]) -> String {
    pages
        .iter()
        .filter(|page| !page.text.is_empty())
        .map(|page| page.text.trim_end_matches('\n'))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    /// Offset of the first character, counted in chars.
    pub start: usize,
    pub text: String,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn end(&self) -> usize {
        self.start + self.char_len()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

pub fn join_chunk_text(hits: &[ScoredChunk], separator: &str) -> String {
    hits.iter()
        .map(|hit| hit.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join(separator)
}
