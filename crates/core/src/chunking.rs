use crate::error::IngestError;
use crate::models::Chunk;

/// Window size and overlap, both counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestError> {
        let config = Self {
            chunk_size,
            chunk_overlap,
        };
        config.validate()?;
        Ok(config)
    }

    /// Large windows for single-document question answering.
    pub fn question_answering() -> Self {
        Self {
            chunk_size: 10_000,
            chunk_overlap: 1_000,
        }
    }

    /// Small windows for matching a company profile against an RFP.
    pub fn profile_matching() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }

    pub fn knowledge_graph() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 100,
        }
    }

    /// Non-overlapping pieces sized for one text-to-speech request each.
    pub fn speech() -> Self {
        Self {
            chunk_size: 2_500,
            chunk_overlap: 0,
        }
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self::question_answering()
    }
}

/// Splits `text` into windows of `chunk_size` chars that advance by
/// `chunk_size - chunk_overlap`. The last window always ends at the end of
/// the input, so the windows cover it without gaps.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<Chunk>, IngestError> {
    config.validate()?;

    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        chunks.push(Chunk {
            index: chunks.len(),
            start,
            text: chars[start..end].iter().collect(),
        });
        if end == chars.len() {
            break;
        }
        start += config.step();
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig::new(size, overlap).expect("valid config")
    }

    #[test]
    fn windows_have_configured_size_and_overlap() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = split_text(text, config(10, 3)).unwrap();

        assert_eq!(
            chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>(),
            vec!["abcdefghij", "hijklmnopq", "opqrstuvwx", "vwxyz"]
        );
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(chunk.char_len(), 10);
        }
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end() - pair[1].start, 3);
        }
    }

    #[test]
    fn windows_cover_input_without_gaps() {
        let text = "Section 4.2 requires ISO 27001 certification and three years of references. "
            .repeat(7);
        let chunks = split_text(&text, config(64, 16)).unwrap();

        assert_eq!(chunks.first().map(|chunk| chunk.start), Some(0));
        assert_eq!(chunks.last().map(Chunk::end), Some(text.chars().count()));
        for pair in chunks.windows(2) {
            assert!(pair[1].start <= pair[0].end(), "gap between windows");
            assert_eq!(pair[1].index, pair[0].index + 1);
        }

        let chars: Vec<char> = text.chars().collect();
        for chunk in &chunks {
            let expected: String = chars[chunk.start..chunk.end()].iter().collect();
            assert_eq!(chunk.text, expected);
        }
    }

    #[test]
    fn short_input_is_one_chunk() {
        let chunks = split_text("short", config(500, 100)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short");
    }

    #[test]
    fn exact_multiple_does_not_emit_trailing_overlap_only_window() {
        let chunks = split_text("abcdefgh", config(4, 0)).unwrap();
        assert_eq!(
            chunks.iter().map(|chunk| chunk.text.as_str()).collect::<Vec<_>>(),
            vec!["abcd", "efgh"]
        );
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(split_text("", config(10, 2)).unwrap().is_empty());
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "données éligibilité ✅ critères";
        let chunks = split_text(text, config(8, 2)).unwrap();
        assert!(chunks.iter().all(|chunk| chunk.char_len() <= 8));
        assert_eq!(chunks.last().map(Chunk::end), Some(text.chars().count()));
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        assert!(ChunkingConfig::new(100, 100).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        let invalid = ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 12,
        };
        assert!(matches!(
            split_text("text", invalid),
            Err(IngestError::InvalidChunkConfig(_))
        ));
    }

    #[test]
    fn presets_are_valid() {
        for preset in [
            ChunkingConfig::question_answering(),
            ChunkingConfig::profile_matching(),
            ChunkingConfig::knowledge_graph(),
            ChunkingConfig::speech(),
        ] {
            assert!(preset.validate().is_ok());
        }
    }
}
