/*!
common/src/lib.rs

Shared configuration types for Postscope.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader merging a defaults file with an override file
- Secret resolution from the environment (proxy credentials, model key)
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_PROXY_HOST: &str = "brd.superproxy.io";
pub const DEFAULT_PROXY_PORT: u16 = 33335;
pub const DEFAULT_LLM_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_LLM_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_RESPONSE_LANGUAGE: &str = "Hebrew";

/// Sample posts offered by the UI when `[ui] sample_urls` is not set.
pub const DEFAULT_SAMPLE_URLS: &[&str] = &[
    "https://t.me/abualiexpress/105824",
    "https://t.me/abualiexpress/105838",
    "https://t.me/shikmabressler24/145",
    "https://beactive.co.il/project/84917",
];

/// Environment variables forming the secret store. They take precedence over TOML values.
pub mod env {
    pub const PROXY_HOST: &str = "BRIGHT_PROXY_HOST";
    pub const PROXY_PORT: &str = "BRIGHT_PROXY_PORT";
    pub const PROXY_USER: &str = "BRIGHT_PROXY_USER";
    pub const PROXY_PASS: &str = "BRIGHT_PROXY_PASS";
    pub const LLM_API_KEY: &str = "GEMINI_API_KEY";
    pub const LLM_MODEL: &str = "GEMINI_MODEL";
    pub const LLM_API_URL: &str = "GEMINI_API_URL";
}

/// HTTP server section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: Option<String>,
    pub port: Option<u16>,
    /// Directory holding the static UI (e.g. "postscope/static")
    pub static_dir: Option<String>,
}

/// Forward proxy used for every outbound page and video fetch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Generative model backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Language the summary must be written in
    pub response_language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default)]
    pub sample_urls: Vec<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub server: Option<ServerConfig>,
    pub proxy: Option<ProxyConfig>,
    pub llm: Option<LlmConfig>,
    pub ui: Option<UiConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Startup loader used by the binaries: `config.default.toml` merged with either the
    /// explicitly given file (which must exist) or `config.toml` when present, then secrets
    /// from the environment.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let default_path = Path::new("config.default.toml");
        let override_path = match explicit {
            Some(p) if !p.exists() => anyhow::bail!("Config file not found: {}", p.display()),
            Some(p) => Some(p),
            None => Some(Path::new("config.toml")).filter(|p| p.exists()),
        };

        let cfg = Self::load_with_defaults(Some(default_path), override_path).await?;
        Ok(cfg.with_env_secrets())
    }

    /// Overlay secrets from the process environment.
    pub fn with_env_secrets(self) -> Self {
        self.with_secrets_from(|key| std::env::var(key).ok())
    }

    /// Overlay secrets looked up by variable name. Empty values are ignored, and so is a
    /// port that does not parse.
    pub fn with_secrets_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let proxy = self.proxy.get_or_insert_with(ProxyConfig::default);
        if let Some(host) = get(env::PROXY_HOST) {
            proxy.host = Some(host);
        }
        if let Some(port) = get(env::PROXY_PORT).and_then(|p| p.parse::<u16>().ok()) {
            proxy.port = Some(port);
        }
        if let Some(user) = get(env::PROXY_USER) {
            proxy.user = Some(user);
        }
        if let Some(password) = get(env::PROXY_PASS) {
            proxy.password = Some(password);
        }

        let llm = self.llm.get_or_insert_with(LlmConfig::default);
        if let Some(key) = get(env::LLM_API_KEY) {
            llm.api_key = Some(key);
        }
        if let Some(model) = get(env::LLM_MODEL) {
            llm.model = Some(model);
        }
        if let Some(url) = get(env::LLM_API_URL) {
            llm.api_url = Some(url);
        }

        self
    }

    /// Sample URLs for the UI, falling back to the built-in list.
    pub fn sample_urls(&self) -> Vec<String> {
        match self.ui.as_ref().map(|ui| &ui.sample_urls) {
            Some(urls) if !urls.is_empty() => urls.clone(),
            _ => DEFAULT_SAMPLE_URLS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
