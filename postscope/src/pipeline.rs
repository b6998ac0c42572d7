//! End-to-end summarization of a single post.
//!
//! One request walks through validation, the page fetch, content extraction, an optional
//! video download, prompt building and the model call. Every network call is awaited in
//! turn; nothing runs in the background. The only resource with a lifecycle is the staged
//! video, which never outlives the summarizing step.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use common::Config;

use crate::extract::{self, MetaKey, MetaMap, MAX_PROMPT_CHARS};
use crate::fetch::{FetchError, FetchResult, PageFetcher, ProxySettings};
use crate::llm::{ModelClient, ModelError, ModelSettings};
use crate::media::StagedMedia;
use crate::prompt::PromptPayload;

/// Read-only configuration used by every request.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub proxy: ProxySettings,
    pub model: ModelSettings,
    pub response_language: String,
}

impl Settings {
    /// Resolve a loaded config (secrets already overlaid) with built-in defaults.
    pub fn from_config(config: &Config) -> Self {
        let proxy = config.proxy.clone().unwrap_or_default();
        let llm = config.llm.clone().unwrap_or_default();

        Self {
            proxy: ProxySettings {
                host: proxy.host.unwrap_or_else(|| common::DEFAULT_PROXY_HOST.to_string()),
                port: proxy.port.unwrap_or(common::DEFAULT_PROXY_PORT),
                user: proxy.user.unwrap_or_default(),
                password: proxy.password.unwrap_or_default(),
            },
            model: ModelSettings {
                api_key: llm.api_key.unwrap_or_default(),
                model: llm.model.unwrap_or_else(|| common::DEFAULT_LLM_MODEL.to_string()),
            },
            response_language: llm
                .response_language
                .unwrap_or_else(|| common::DEFAULT_RESPONSE_LANGUAGE.to_string()),
        }
    }

    pub fn has_proxy_credentials(&self) -> bool {
        !self.proxy.host.trim().is_empty()
            && !self.proxy.user.trim().is_empty()
            && !self.proxy.password.is_empty()
    }

    pub fn has_model_key(&self) -> bool {
        !self.model.api_key.trim().is_empty()
    }
}

/// States a request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    FetchingPage,
    Extracting,
    Prompting,
    FetchingVideo,
    StagingMedia,
    Summarizing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validating => "validating",
            Stage::FetchingPage => "fetching_page",
            Stage::Extracting => "extracting",
            Stage::Prompting => "prompting",
            Stage::FetchingVideo => "fetching_video",
            Stage::StagingMedia => "staging_media",
            Stage::Summarizing => "summarizing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(String),
    #[error("Proxy error: {0}")]
    Proxy(#[source] FetchError),
    #[error("{0}")]
    Model(#[source] ModelError),
}

impl PipelineError {
    /// State the request was in when it failed.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Validation(_) => Stage::Validating,
            PipelineError::Proxy(_) => Stage::FetchingPage,
            PipelineError::Model(_) => Stage::Summarizing,
        }
    }

    /// Stable tag for API clients.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Validation(_) => "validation",
            PipelineError::Proxy(_) => "proxy",
            PipelineError::Model(e) if e.is_unavailable() => "model_unavailable",
            PipelineError::Model(_) => "model",
        }
    }
}

/// How a fetched body was turned into prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Markup,
    Json,
    Other,
}

impl ContentKind {
    pub fn from_content_type(content_type: &str) -> Self {
        let ct = content_type.to_ascii_lowercase();
        if ct.contains("text/html") || ct.contains("application/xhtml+xml") {
            ContentKind::Markup
        } else if ct.contains("application/json") {
            ContentKind::Json
        } else {
            ContentKind::Other
        }
    }
}

/// Text and metadata extracted from one fetched page.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    pub kind: ContentKind,
    pub text: String,
    pub meta: MetaMap,
    pub video_url: Option<String>,
}

/// Convert a fetched body into prompt text according to its declared content type.
pub fn extract_content(page: &FetchResult) -> ExtractedContent {
    let kind = ContentKind::from_content_type(&page.content_type);
    match kind {
        ContentKind::Markup => {
            let meta = extract::extract_meta_tags(&page.text);
            let video_url = meta
                .get(MetaKey::OgVideo)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string);
            ExtractedContent {
                kind,
                text: extract::html_to_text(&page.text),
                meta,
                video_url,
            }
        }
        ContentKind::Json => {
            let text = match serde_json::from_slice::<serde_json::Value>(&page.bytes) {
                Ok(value) => value.to_string(),
                Err(e) => {
                    debug!("extract: JSON body did not parse ({}), using raw text", e);
                    page.text.clone()
                }
            };
            ExtractedContent {
                kind,
                text,
                meta: MetaMap::default(),
                video_url: None,
            }
        }
        ContentKind::Other => ExtractedContent {
            kind,
            text: format!(
                "Non-text content fetched. Content-Type: {}. Size: {} bytes.",
                page.content_type,
                page.bytes.len()
            ),
            meta: MetaMap::default(),
            video_url: None,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
}

/// Progress or warning message surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Final model answer. An empty reply is a notice, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Summary(String),
    Empty,
}

/// Everything the presentation layer shows for a finished request.
#[derive(Debug, Clone)]
pub struct Report {
    pub url: String,
    pub content_type: String,
    pub content_kind: ContentKind,
    pub preview: String,
    pub meta: MetaMap,
    pub prompt: PromptPayload,
    pub video_staged: bool,
    pub notices: Vec<Notice>,
    pub outcome: Outcome,
}

/// Drives one request end to end.
pub struct Pipeline<'a> {
    fetcher: &'a dyn PageFetcher,
    model: &'a dyn ModelClient,
    settings: &'a Settings,
}

impl<'a> Pipeline<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, model: &'a dyn ModelClient, settings: &'a Settings) -> Self {
        Self {
            fetcher,
            model,
            settings,
        }
    }

    fn enter(&self, stage: Stage) {
        debug!(%stage, "pipeline: entering stage");
    }

    /// Check preconditions. Nothing touches the network before this passes.
    pub fn validate(&self, url: &str) -> Result<String, PipelineError> {
        self.enter(Stage::Validating);
        let url = url.trim();
        if url.is_empty() {
            return Err(PipelineError::Validation("Please enter a URL.".into()));
        }
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            Ok(parsed) => {
                return Err(PipelineError::Validation(format!(
                    "Unsupported URL scheme '{}': only http and https are allowed.",
                    parsed.scheme()
                )))
            }
            Err(e) => return Err(PipelineError::Validation(format!("Invalid URL '{}': {}.", url, e))),
        }
        if !self.settings.has_proxy_credentials() {
            return Err(PipelineError::Validation(
                "Missing proxy settings (host, user, password) in secrets.".into(),
            ));
        }
        if !self.settings.has_model_key() {
            return Err(PipelineError::Validation(format!(
                "Missing {} in secrets.",
                common::env::LLM_API_KEY
            )));
        }
        Ok(url.to_string())
    }

    pub async fn run(&self, url: &str) -> Result<Report, PipelineError> {
        let url = self.validate(url).inspect_err(|e| warn!("pipeline: validation failed: {}", e))?;
        let mut notices = Vec::new();

        self.enter(Stage::FetchingPage);
        notices.push(Notice::new(NoticeLevel::Info, "Fetching post data via proxy..."));
        let page = self
            .fetcher
            .fetch(&self.settings.proxy, &url)
            .await
            .map_err(|e| {
                error!("pipeline: page fetch failed for {}: {}", url, e);
                PipelineError::Proxy(e)
            })?;

        self.enter(Stage::Extracting);
        let extracted = extract_content(&page);
        let text = extract::truncate_text(&extracted.text, MAX_PROMPT_CHARS);
        let preview = extract::preview(&text);
        info!(
            "pipeline: extracted {} chars ({:?}), {} meta keys, video: {}",
            text.chars().count(),
            extracted.kind,
            extracted.meta.len(),
            extracted.video_url.is_some()
        );

        self.enter(Stage::Prompting);
        let prompt = PromptPayload::build(&url, &extracted.meta, &text, &self.settings.response_language);

        let mut staged = match extracted.video_url.as_deref() {
            Some(video_url) => self.stage_video(video_url, &mut notices).await,
            None => None,
        };
        let video_staged = staged.is_some();

        self.enter(Stage::Summarizing);
        notices.push(Notice::new(NoticeLevel::Info, "Analyzing with the model..."));
        let result = self
            .model
            .summarize(&self.settings.model, prompt.as_str(), staged.as_ref().map(StagedMedia::path))
            .await;
        if let Some(media) = staged.take() {
            media.discard();
        }
        let reply = result.map_err(|e| {
            error!("pipeline: model call failed: {}", e);
            PipelineError::Model(e)
        })?;

        self.enter(Stage::Done);
        let outcome = if reply.is_empty() {
            notices.push(Notice::new(NoticeLevel::Warning, "No response returned from the model."));
            Outcome::Empty
        } else {
            Outcome::Summary(reply)
        };

        Ok(Report {
            url,
            content_type: page.content_type,
            content_kind: extracted.kind,
            preview,
            meta: extracted.meta,
            prompt,
            video_staged,
            notices,
            outcome,
        })
    }

    /// Download and stage the post's video. Failures only add a warning.
    async fn stage_video(&self, video_url: &str, notices: &mut Vec<Notice>) -> Option<StagedMedia> {
        self.enter(Stage::FetchingVideo);
        notices.push(Notice::new(NoticeLevel::Info, "Downloading video for analysis..."));

        let video = match self.fetcher.fetch(&self.settings.proxy, video_url).await {
            Ok(video) => video,
            Err(e) => {
                warn!("pipeline: video download failed for {}: {}", video_url, e);
                notices.push(Notice::new(NoticeLevel::Warning, format!("Video download failed: {}", e)));
                return None;
            }
        };

        self.enter(Stage::StagingMedia);
        match StagedMedia::stage(video.bytes).await {
            Ok(media) => {
                notices.push(Notice::new(NoticeLevel::Success, "Video downloaded for analysis."));
                Some(media)
            }
            Err(e) => {
                warn!("pipeline: could not stage video: {}", e);
                notices.push(Notice::new(NoticeLevel::Warning, format!("Video download failed: {}", e)));
                None
            }
        }
    }
}
