use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use super::{ModelClient, ModelError, ModelSettings};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

// --- Gemini REST request and response structures ---

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    File {
        #[serde(rename = "fileData")]
        file_data: FileData,
    },
    Text {
        text: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    mime_type: String,
    file_uri: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: Option<bool>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate, skipping thought summaries.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|p| p.thought != Some(true))
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
struct UploadStart<'a> {
    file: UploadStartFile<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadStartFile<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: FileResource,
}

/// File registered with the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResource {
    name: String,
    uri: String,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

impl FileResource {
    fn state_is(&self, state: &str) -> bool {
        self.state.as_deref() == Some(state)
    }
}

// --- Gemini client implementation ---

/// Client for the Gemini `generateContent` and file upload REST endpoints.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    base_url: String,
    client: Client,
    poll_interval: Duration,
    max_polls: u32,
}

impl GeminiClient {
    /// `api_url` is the service root, e.g. `https://generativelanguage.googleapis.com`.
    ///
    /// No request timeout is set: generation is bounded only by the backend.
    pub fn new(api_url: &str) -> Result<Self, ModelError> {
        let parsed = Url::parse(api_url)
            .map_err(|e| ModelError::Unavailable(format!("invalid backend URL '{}': {}", api_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ModelError::Unavailable(format!(
                "unsupported backend URL scheme '{}'",
                parsed.scheme()
            )));
        }
        let client = Client::builder()
            .user_agent("Postscope/0.1.0")
            .build()
            .map_err(|e| ModelError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: api_url.trim_end_matches('/').to_string(),
            client,
            poll_interval: Duration::from_secs(2),
            max_polls: 30,
        })
    }

    /// How often, and how many times, to check an uploaded file that is still processing.
    pub fn with_polling(mut self, interval: Duration, max_polls: u32) -> Self {
        self.poll_interval = interval;
        self.max_polls = max_polls;
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn upload_file(&self, settings: &ModelSettings, path: &Path) -> Result<FileResource, ModelError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| ModelError::Media {
            path: path.to_path_buf(),
            source,
        })?;
        let mime_type = mime_for(path);
        let display_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("media");

        info!("gemini: uploading {} ({} bytes, {})", display_name, bytes.len(), mime_type);

        let start = self
            .client
            .post(self.endpoint("upload/v1beta/files"))
            .header(API_KEY_HEADER, &settings.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStart {
                file: UploadStartFile { display_name },
            })
            .send()
            .await?;
        let start = check_status(start).await?;

        let session_url = start
            .headers()
            .get(UPLOAD_URL_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ModelError::Upload("backend did not return an upload URL".into()))?;

        let finalize = self
            .client
            .post(&session_url)
            .header(API_KEY_HEADER, &settings.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let body = check_status(finalize).await?.text().await?;
        let uploaded: UploadResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::Parse(format!("upload response: {} (body: {})", e, body)))?;

        debug!(file = %uploaded.file.name, state = ?uploaded.file.state, "gemini: upload finalized");
        Ok(uploaded.file)
    }

    /// Video files are processed asynchronously by the backend; they cannot be referenced
    /// before they become active.
    async fn wait_until_active(&self, settings: &ModelSettings, mut file: FileResource) -> Result<FileResource, ModelError> {
        let mut polls = 0;
        while file.state_is("PROCESSING") && polls < self.max_polls {
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;

            let response = self
                .client
                .get(self.endpoint(&format!("v1beta/{}", file.name)))
                .header(API_KEY_HEADER, &settings.api_key)
                .send()
                .await?;
            let body = check_status(response).await?.text().await?;
            file = serde_json::from_str(&body)
                .map_err(|e| ModelError::Parse(format!("file status: {} (body: {})", e, body)))?;
        }

        if file.state_is("FAILED") {
            return Err(ModelError::Upload(format!("backend failed to process {}", file.name)));
        }
        if file.state_is("PROCESSING") {
            warn!("gemini: {} still processing after {} checks, using it anyway", file.name, polls);
        }
        Ok(file)
    }

    async fn generate(&self, settings: &ModelSettings, parts: Vec<Part>) -> Result<String, ModelError> {
        let model = settings.model.trim_start_matches("models/");
        let request = GenerateRequest {
            contents: vec![Content { role: "user", parts }],
        };

        let response = self
            .client
            .post(self.endpoint(&format!("v1beta/models/{}:generateContent", model)))
            .header(API_KEY_HEADER, &settings.api_key)
            .json(&request)
            .send()
            .await?;
        let body = check_status(response).await?.text().await?;

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::Parse(format!("{} (body: {})", e, body)))?;
        Ok(parsed.text())
    }
}

#[async_trait::async_trait]
impl ModelClient for GeminiClient {
    async fn summarize(
        &self,
        settings: &ModelSettings,
        prompt: &str,
        media: Option<&Path>,
    ) -> Result<String, ModelError> {
        let mut parts = Vec::with_capacity(2);
        if let Some(path) = media {
            let uploaded = self.upload_file(settings, path).await?;
            let file = self.wait_until_active(settings, uploaded).await?;
            parts.push(Part::File {
                file_data: FileData {
                    mime_type: file.mime_type.unwrap_or_else(|| mime_for(path).to_string()),
                    file_uri: file.uri,
                },
            });
        }
        parts.push(Part::Text {
            text: prompt.to_string(),
        });

        let text = self.generate(settings, parts).await?;
        info!("gemini: model {} returned {} chars", settings.model, text.chars().count());
        Ok(text)
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ModelError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ModelError::Api { status, body })
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unusable_backend_urls() {
        assert!(GeminiClient::new("not a url").unwrap_err().is_unavailable());
        assert!(GeminiClient::new("ftp://example.com").unwrap_err().is_unavailable());
        assert!(GeminiClient::new("https://generativelanguage.googleapis.com/").is_ok());
    }

    #[test]
    fn response_text_joins_parts_and_skips_thoughts() {
        let body = r#"{"candidates":[{"content":{"parts":[
            {"text":"thinking...","thought":true},
            {"text":"Hello "},
            {"text":"world"}
        ]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.text(), "Hello world");
    }

    #[test]
    fn missing_text_is_empty() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).unwrap();
        assert_eq!(parsed.text(), "");
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.text(), "");
    }

    #[test]
    fn file_part_serializes_in_rest_casing() {
        let part = Part::File {
            file_data: FileData {
                mime_type: "video/mp4".into(),
                file_uri: "https://example.test/files/abc".into(),
            },
        };
        assert_eq!(
            serde_json::to_string(&part).unwrap(),
            r#"{"fileData":{"mimeType":"video/mp4","fileUri":"https://example.test/files/abc"}}"#
        );
    }

    #[test]
    fn mime_guess_from_extension() {
        assert_eq!(mime_for(Path::new("/tmp/postscope-x.mp4")), "video/mp4");
        assert_eq!(mime_for(Path::new("/tmp/clip.MOV")), "video/quicktime");
        assert_eq!(mime_for(Path::new("/tmp/blob")), "application/octet-stream");
    }
}
