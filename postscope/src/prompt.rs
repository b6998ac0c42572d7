use std::fmt;

use crate::extract::MetaMap;

/// Content types the model is asked to detect in a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCategory {
    Text,
    Image,
    Video,
    Audio,
}

impl ContentCategory {
    pub const ALL: [ContentCategory; 4] = [
        ContentCategory::Text,
        ContentCategory::Image,
        ContentCategory::Video,
        ContentCategory::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCategory::Text => "text",
            ContentCategory::Image => "image",
            ContentCategory::Video => "video",
            ContentCategory::Audio => "audio",
        }
    }
}

/// The single instruction prompt sent to the model for one post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPayload(String);

impl PromptPayload {
    /// `content` is expected to be truncated already.
    pub fn build(url: &str, meta: &MetaMap, content: &str, language: &str) -> Self {
        let categories = ContentCategory::ALL
            .iter()
            .map(ContentCategory::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        let prompt = format!(
            "You are analyzing a social media post. Summarize what it is about and infer the content types present. \
             Possible types: {categories}. More than one can apply. Use the extracted content and metadata.\n\n\
             Respond in {language}.\n\n\
             URL: {url}\n\n\
             Metadata: {metadata}\n\n\
             Content:\n{content}\n\n\
             If a video is provided, also describe what happens in the video.\n\n\
             In your answer, include: (1) a concise summary, (2) the detected content types, \
             (3) which content types were successfully analyzed.",
            metadata = meta.to_json_string(),
        );
        PromptPayload(prompt)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PromptPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
