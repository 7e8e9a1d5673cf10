use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ELEVENLABS_API_KEY: &str = "ELEVENLABS_API_KEY";

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Hosted model family used for completions and embeddings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    OpenAi,
    /// Offline trigram embeddings; completions still need a hosted model.
    Local,
}

impl Provider {
    pub fn default_chat_model(&self) -> &'static str {
        match self {
            Provider::Gemini | Provider::Local => "gemini-1.5-flash",
            Provider::OpenAi => "gpt-4o",
        }
    }

    pub fn default_embedding_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "text-embedding-004",
            Provider::OpenAi => "text-embedding-3-small",
            Provider::Local => "char-trigram",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Gemini | Provider::Local => GOOGLE_API_KEY,
            Provider::OpenAi => OPENAI_API_KEY,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Local => "local",
        };
        f.write_str(name)
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            "local" => Ok(Provider::Local),
            other => Err(format!("unknown provider `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub provider: Provider,
    pub chat_model: String,
    pub embedding_model: String,
    pub temperature: f32,
}

impl ModelSettings {
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            chat_model: provider.default_chat_model().to_string(),
            embedding_model: provider.default_embedding_model().to_string(),
            temperature: 0.3,
        }
    }
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::for_provider(Provider::default())
    }
}

/// Returns the trimmed key, or `MissingApiKey` naming the variable that
/// should have supplied it.
pub fn require_key(value: Option<&str>, var: &'static str) -> Result<String, ServiceError> {
    value
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .ok_or(ServiceError::MissingApiKey(var))
}
