/*
postscope - single-binary main.rs
This binary loads configuration and secrets, then serves the summarizer UI and JSON API.
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use common::Config;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use postscope::fetch::ProxyFetcher;
use postscope::llm::gemini::GeminiClient;
use postscope::pipeline::Settings;
use postscope::server::{launch_rocket, AppState};

#[derive(Parser, Debug)]
#[command(name = "postscope", about = "Postscope social post summarizer server")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    // Secrets may live in a local .env file
    if dotenv::dotenv().is_ok() {
        info!(".env loaded");
    }

    let config = match Config::load(args.config.as_deref()).await {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(%e, "failed to load configuration");
            return Err(e);
        }
    };
    let settings = Settings::from_config(&config);
    info!(
        proxy_host = %settings.proxy.host,
        proxy_port = settings.proxy.port,
        model = %settings.model.model,
        "configuration loaded"
    );
    if !settings.has_proxy_credentials() {
        warn!("proxy credentials are not configured; requests will be rejected until they are set");
    }
    if !settings.has_model_key() {
        warn!("{} is not set; requests will be rejected until it is", common::env::LLM_API_KEY);
    }

    let api_url = config
        .llm
        .as_ref()
        .and_then(|l| l.api_url.clone())
        .unwrap_or_else(|| common::DEFAULT_LLM_API_URL.to_string());
    let model = GeminiClient::new(&api_url).context("failed to initialize model client")?;
    info!("Model client initialized: {} at {}", settings.model.model, api_url);

    let state = AppState::new(
        settings,
        config.sample_urls(),
        Arc::new(ProxyFetcher::new()),
        Arc::new(model),
    );

    launch_rocket(&config, state).await?;

    info!("Shutdown complete");
    Ok(())
}
