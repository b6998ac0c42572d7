use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod gemini;

/// Credentials and model selection for one summarization call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ModelSettings {
    pub api_key: String,
    pub model: String,
}

impl fmt::Debug for ModelSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSettings")
            .field("api_key", &"***")
            .field("model", &self.model)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    /// The backend integration cannot be used at all; fixing it needs operator action.
    #[error("Model backend unavailable: {0}. Check `llm.api_url` (or GEMINI_API_URL) and network access to the backend.")]
    Unavailable(String),
    #[error("failed to read media file {path}: {source}")]
    Media {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("model API error {status}: {body}")]
    Api { status: u16, body: String },
    #[error("media upload failed: {0}")]
    Upload(String),
    #[error("failed to parse model response: {0}")]
    Parse(String),
}

impl ModelError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, ModelError::Unavailable(_))
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_builder() {
            ModelError::Unavailable(e.to_string())
        } else {
            ModelError::Request(e)
        }
    }
}

/// Core trait for generative model backends.
#[async_trait::async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a text reply for `prompt`, optionally grounded on one media file.
    ///
    /// Returns an empty string when the backend reply carries no text.
    async fn summarize(
        &self,
        settings: &ModelSettings,
        prompt: &str,
        media: Option<&Path>,
    ) -> Result<String, ModelError>;
}
