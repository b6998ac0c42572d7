use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use common::Config;
use tracing_subscriber::EnvFilter;

use postscope::fetch::ProxyFetcher;
use postscope::llm::gemini::GeminiClient;
use postscope::pipeline::{NoticeLevel, Outcome, Pipeline, Settings};

/// Summarize one post from the command line using the server's configuration.
#[derive(Parser, Debug)]
#[command(name = "summarize_url")]
struct Args {
    /// Post URL to summarize
    url: String,

    /// Path to config.toml
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    dotenv::dotenv().ok();

    let config = Config::load(args.config.as_deref()).await?;
    let settings = Settings::from_config(&config);
    let api_url = config
        .llm
        .as_ref()
        .and_then(|l| l.api_url.clone())
        .unwrap_or_else(|| common::DEFAULT_LLM_API_URL.to_string());
    let model = GeminiClient::new(&api_url)?;
    let fetcher = ProxyFetcher::new();

    let pipeline = Pipeline::new(&fetcher, &model, &settings);
    let report = match pipeline.run(&args.url).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("✗ {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    for notice in &report.notices {
        let mark = match notice.level {
            NoticeLevel::Info => "·",
            NoticeLevel::Success => "✓",
            NoticeLevel::Warning => "!",
        };
        println!("{} {}", mark, notice.message);
    }

    println!("\n{}", "=".repeat(60));
    println!("Response preview ({})", report.content_type);
    println!("{}", "=".repeat(60));
    println!("{}", report.preview);

    println!("\n{}", "=".repeat(60));
    println!("Summary");
    println!("{}", "=".repeat(60));
    match report.outcome {
        Outcome::Summary(text) => println!("{}", text),
        Outcome::Empty => println!("(no content returned)"),
    }

    Ok(ExitCode::SUCCESS)
}
