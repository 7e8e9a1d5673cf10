use docbrief_core::{
    CharacterNgramEmbedder, Embedder, GeminiClient, GeminiEmbedder, LanguageModel, ModelSettings,
    OpenAiClient, OpenAiEmbedder, Provider, ServiceError,
};
use std::sync::Arc;

/// Hosted credentials gathered from flags and the environment.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub google_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
}

/// Builds the completion and embedding clients for the selected provider.
pub struct ModelFactory {
    settings: ModelSettings,
    credentials: Credentials,
}

impl ModelFactory {
    pub fn new(settings: ModelSettings, credentials: Credentials) -> Self {
        Self {
            settings,
            credentials,
        }
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    pub fn language_model(&self) -> Result<Arc<dyn LanguageModel>, ServiceError> {
        let settings = &self.settings;
        match settings.provider {
            Provider::Gemini | Provider::Local => Ok(Arc::new(GeminiClient::new(
                self.credentials.google_api_key.as_deref(),
                settings.chat_model.clone(),
                settings.temperature,
            )?)),
            Provider::OpenAi => {
                let client = OpenAiClient::new(
                    self.credentials.openai_api_key.as_deref(),
                    settings.chat_model.clone(),
                    settings.temperature,
                )?;
                Ok(Arc::new(match &self.credentials.openai_base_url {
                    Some(base_url) => client.with_base_url(base_url.trim_end_matches('/')),
                    None => client,
                }))
            }
        }
    }

    pub fn embedder(&self) -> Result<Arc<dyn Embedder>, ServiceError> {
        let settings = &self.settings;
        match settings.provider {
            Provider::Gemini => Ok(Arc::new(GeminiEmbedder::new(
                self.credentials.google_api_key.as_deref(),
                settings.embedding_model.clone(),
            )?)),
            Provider::OpenAi => {
                let embedder = OpenAiEmbedder::new(
                    self.credentials.openai_api_key.as_deref(),
                    settings.embedding_model.clone(),
                )?;
                Ok(Arc::new(match &self.credentials.openai_base_url {
                    Some(base_url) => embedder.with_base_url(base_url.trim_end_matches('/')),
                    None => embedder,
                }))
            }
            Provider::Local => Ok(Arc::new(CharacterNgramEmbedder::default())),
        }
    }
}
