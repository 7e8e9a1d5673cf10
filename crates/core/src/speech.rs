use crate::chunking::ChunkingConfig;
use crate::config::{require_key, ELEVENLABS_API_KEY, ELEVENLABS_BASE_URL};
use crate::error::{PipelineError, ServiceError};
use crate::extractor::extract_document;
use crate::traits::SpeechSynthesizer;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::path::Path;

/// Voice id of the "Aria" preset voice.
pub const DEFAULT_VOICE_ID: &str = "9BWtsMINqrJLrRacOk9x";
pub const DEFAULT_SPEECH_MODEL: &str = "eleven_turbo_v2";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_22050_32";

pub struct ElevenLabsClient {
    client: Client,
    base_url: String,
    api_key: String,
    voice_id: String,
    model_id: String,
    output_format: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: Option<&str>) -> Result<Self, ServiceError> {
        Ok(Self {
            client: Client::new(),
            base_url: ELEVENLABS_BASE_URL.to_string(),
            api_key: require_key(api_key, ELEVENLABS_API_KEY)?,
            voice_id: DEFAULT_VOICE_ID.to_string(),
            model_id: DEFAULT_SPEECH_MODEL.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        })
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = output_format.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/text-to-speech/{}?output_format={}",
            self.base_url, self.voice_id, self.output_format
        )
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .header("accept", "audio/mpeg")
            .json(&SpeechRequest {
                text,
                model_id: &self.model_id,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::backend("elevenlabs", format!("{status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Splits `text` into pieces of at most `max_chars` characters. Each cut is
/// moved back to just after the last whitespace so no word is split; a run
/// with no whitespace at all is cut hard. The pieces concatenate to `text`.
pub fn speech_pieces(text: &str, max_chars: usize) -> Vec<&str> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        let Some((limit, _)) = rest.char_indices().nth(max_chars) else {
            pieces.push(rest);
            break;
        };

        let window = &rest[..limit];
        let cut = window
            .char_indices()
            .rev()
            .find(|(_, ch)| ch.is_whitespace())
            .map(|(at, ch)| at + ch.len_utf8())
            .unwrap_or(limit);

        pieces.push(&rest[..cut]);
        rest = &rest[cut..];
    }

    pieces
}

/// Synthesizes `text` piece by piece and concatenates the encoded audio.
/// MP3 frames are self-delimiting, so the joined stream plays end to end.
pub async fn synthesize_long_text<S>(synthesizer: &S, text: &str) -> Result<Vec<u8>, PipelineError>
where
    S: SpeechSynthesizer + ?Sized,
{
    if text.trim().is_empty() {
        return Err(PipelineError::MissingInput("nothing to read aloud".to_string()));
    }

    let pieces = speech_pieces(text, ChunkingConfig::speech().chunk_size);
    let mut audio = Vec::new();
    for (index, piece) in pieces.iter().enumerate() {
        if piece.trim().is_empty() {
            continue;
        }
        tracing::debug!(piece = index, total = pieces.len(), "synthesizing speech");
        audio.extend(synthesizer.synthesize(piece).await?);
    }
    Ok(audio)
}

pub async fn pdf_to_speech<S>(
    synthesizer: &S,
    document: &Path,
    output: &Path,
) -> Result<usize, PipelineError>
where
    S: SpeechSynthesizer + ?Sized,
{
    let extracted = extract_document(document)?;
    let audio = synthesize_long_text(synthesizer, &extracted.text()).await?;
    tokio::fs::write(output, &audio)
        .await
        .map_err(ServiceError::from)?;

    tracing::info!(output = %output.display(), bytes = audio.len(), "wrote speech audio");
    Ok(audio.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct EchoSynthesizer {
        calls: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for EchoSynthesizer {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>, ServiceError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(text.chars().count());
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    #[tokio::test]
    async fn long_text_is_spoken_in_order_without_overlap() {
        let synthesizer = EchoSynthesizer::default();
        let text = "Section one. ".repeat(400);

        let audio = synthesize_long_text(&synthesizer, &text).await.unwrap();

        assert_eq!(audio, text.as_bytes());
        let calls = synthesizer.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|count| *count <= ChunkingConfig::speech().chunk_size));
    }

    #[test]
    fn pieces_break_between_words() {
        assert_eq!(speech_pieces("alpha beta gamma", 8), vec!["alpha ", "beta ", "gamma"]);
        assert_eq!(speech_pieces("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(speech_pieces("déjà vu ça", 5), vec!["déjà ", "vu ça"]);
        assert!(speech_pieces("", 10).is_empty());
    }

    #[tokio::test]
    async fn long_text_pieces_end_on_whitespace() {
        let synthesizer = EchoSynthesizer::default();
        let text = "Procurement ".repeat(500);

        let audio = synthesize_long_text(&synthesizer, &text).await.unwrap();
        assert_eq!(audio, text.as_bytes());

        for piece in speech_pieces(&text, ChunkingConfig::speech().chunk_size) {
            assert!(piece.ends_with(' '));
            assert!(piece.chars().count() <= ChunkingConfig::speech().chunk_size);
        }
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let synthesizer = EchoSynthesizer::default();
        assert!(matches!(
            synthesize_long_text(&synthesizer, "  \n").await,
            Err(PipelineError::MissingInput(_))
        ));
    }

    #[test]
    fn endpoint_includes_voice_and_format() {
        let client = ElevenLabsClient::new(Some("key"))
            .unwrap()
            .with_voice("voice-123");
        assert_eq!(
            client.endpoint(),
            "https://api.elevenlabs.io/v1/text-to-speech/voice-123?output_format=mp3_22050_32"
        );
        assert!(matches!(
            ElevenLabsClient::new(None),
            Err(ServiceError::MissingApiKey(ELEVENLABS_API_KEY))
        ));
    }
}
