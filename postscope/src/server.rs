use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::response::Redirect;
use rocket::serde::json::Json;
use rocket::{get, post, routes, Build, Rocket, State};
use serde::{Deserialize, Serialize};

use common::Config;

use crate::extract::MetaMap;
use crate::fetch::PageFetcher;
use crate::llm::ModelClient;
use crate::pipeline::{ContentKind, Notice, Outcome, Pipeline, PipelineError, Report, Settings, Stage};

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub settings: Arc<Settings>,
    pub sample_urls: Vec<String>,
    pub fetcher: Arc<dyn PageFetcher>,
    pub model: Arc<dyn ModelClient>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        sample_urls: Vec<String>,
        fetcher: Arc<dyn PageFetcher>,
        model: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            started_at: Utc::now(),
            settings: Arc::new(settings),
            sample_urls,
            fetcher,
            model,
        }
    }
}

/// Response structure for `/api/v1/status`. Secrets are reported as present/absent only.
#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    uptime_seconds: i64,
    model: String,
    proxy_configured: bool,
    model_key_configured: bool,
}

/// Request body for `/api/v1/summarize`. A non-empty `sample` replaces `url`.
#[derive(Debug, Default, Deserialize)]
pub struct SummarizeRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub sample: Option<String>,
}

impl SummarizeRequest {
    pub fn target_url(&self) -> &str {
        match self.sample.as_deref().map(str::trim) {
            Some(sample) if !sample.is_empty() => sample,
            _ => &self.url,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub url: String,
    pub content_type: String,
    pub content_kind: ContentKind,
    pub preview: String,
    pub metadata: MetaMap,
    pub video_analyzed: bool,
    pub notices: Vec<Notice>,
    /// "ok" with a summary, or "empty" when the model returned nothing.
    pub status: &'static str,
    pub summary: Option<String>,
}

impl From<Report> for SummarizeResponse {
    fn from(report: Report) -> Self {
        let (status, summary) = match report.outcome {
            Outcome::Summary(text) => ("ok", Some(text)),
            Outcome::Empty => ("empty", None),
        };
        Self {
            url: report.url,
            content_type: report.content_type,
            content_kind: report.content_kind,
            preview: report.preview,
            metadata: report.meta,
            video_analyzed: report.video_staged,
            notices: report.notices,
            status,
            summary,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub stage: Stage,
    pub message: String,
}

fn http_status(err: &PipelineError) -> Status {
    match err {
        PipelineError::Validation(_) => Status::BadRequest,
        PipelineError::Proxy(_) => Status::BadGateway,
        PipelineError::Model(e) if e.is_unavailable() => Status::ServiceUnavailable,
        PipelineError::Model(_) => Status::BadGateway,
    }
}

/// Redirect root to static index.html
#[get("/")]
async fn index_redirect() -> Redirect {
    Redirect::to("/static/index.html")
}

#[get("/health")]
async fn health() -> &'static str {
    "OK"
}

#[get("/api/v1/status")]
async fn status(state: &State<AppState>) -> Json<StatusResponse> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: uptime,
        model: state.settings.model.model.clone(),
        proxy_configured: state.settings.has_proxy_credentials(),
        model_key_configured: state.settings.has_model_key(),
    })
}

#[get("/api/v1/samples")]
async fn samples(state: &State<AppState>) -> Json<Vec<String>> {
    Json(state.sample_urls.clone())
}

/// Run the whole pipeline for one URL. Errors abort this request only.
#[post("/api/v1/summarize", data = "<body>")]
async fn summarize(
    state: &State<AppState>,
    body: Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, (Status, Json<ErrorResponse>)> {
    let pipeline = Pipeline::new(state.fetcher.as_ref(), state.model.as_ref(), &state.settings);
    match pipeline.run(body.target_url()).await {
        Ok(report) => Ok(Json(report.into())),
        Err(e) => {
            tracing::warn!(kind = e.kind(), stage = %e.stage(), "summarize request failed: {}", e);
            Err((
                http_status(&e),
                Json(ErrorResponse {
                    kind: e.kind(),
                    stage: e.stage(),
                    message: e.to_string(),
                }),
            ))
        }
    }
}

/// Assemble the Rocket instance. The static UI is mounted only when `static_dir` exists.
pub fn build_rocket(figment: rocket::figment::Figment, state: AppState, static_dir: Option<&str>) -> Rocket<Build> {
    let rocket = rocket::custom(figment).manage(state).mount(
        "/",
        routes![index_redirect, health, status, samples, summarize],
    );

    match static_dir {
        Some(dir) if Path::new(dir).is_dir() => rocket.mount("/static", FileServer::from(dir)),
        Some(dir) => {
            tracing::warn!("static UI directory '{}' not found; serving API only", dir);
            rocket
        }
        None => rocket,
    }
}

/// Launch the HTTP server, applying `[server]` bind/port from the configuration.
///
/// This function blocks until the Rocket server shuts down.
pub async fn launch_rocket(config: &Config, state: AppState) -> Result<()> {
    let mut fig = rocket::Config::figment();
    let server = config.server.clone().unwrap_or_default();
    if let Some(bind) = server.bind {
        fig = fig.merge(("address", bind));
    }
    if let Some(port) = server.port {
        fig = fig.merge(("port", port));
    }
    let static_dir = server.static_dir.unwrap_or_else(|| "postscope/static".to_string());

    tracing::info!("Starting Rocket HTTP server");
    build_rocket(fig, state, Some(&static_dir))
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
