use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Webhook,
    Polling,
}

impl std::fmt::Display for BotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotMode::Webhook => write!(f, "webhook"),
            BotMode::Polling => write!(f, "polling"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub replies: RepliesConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub mode: BotMode,
    /// Public base URL of this service. When set, the webhook is registered
    /// with Telegram at `<public_url>/<bot_token>` on startup.
    #[serde(default)]
    pub public_url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractorConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
    #[serde(default = "default_format")]
    pub format: String,
    /// Certificate validation is off unless explicitly enabled.
    #[serde(default)]
    pub check_certificates: bool,
    /// Upper bound for a single extraction. Unset means wait indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            format: default_format(),
            check_certificates: false,
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RepliesConfig {
    /// Embed the raw extractor error in the chat reply.
    #[serde(default = "default_expose_errors")]
    pub expose_errors: bool,
}

impl Default for RepliesConfig {
    fn default() -> Self {
        Self {
            expose_errors: default_expose_errors(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_binary() -> String {
    "yt-dlp".to_string()
}

fn default_format() -> String {
    "best[ext=mp4]/best".to_string()
}

fn default_expose_errors() -> bool {
    true
}

impl Config {
    /// Read the TOML file at `path`, then apply `BOT_TOKEN` and `PORT` from
    /// the environment. A missing file is an error only when `required`.
    pub fn load(path: &Path, required: bool) -> Result<Self> {
        let config = Self::read_file(path, required)?;

        let config = config.with_env_overrides(
            std::env::var("BOT_TOKEN").ok(),
            std::env::var("PORT").ok(),
        )?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path, required: bool) -> Result<Self> {
        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config file")
    }

    fn with_env_overrides(mut self, token: Option<String>, port: Option<String>) -> Result<Self> {
        if let Some(token) = token.filter(|t| !t.trim().is_empty()) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(port) = port {
            self.server.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid PORT value: {port}"))?;
        }
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.is_empty() {
            anyhow::bail!("BOT_TOKEN is not set (environment or [telegram] bot_token)");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Full webhook URL to register with Telegram, if a public URL is configured.
    pub fn webhook_url(&self) -> Option<String> {
        self.telegram.public_url.as_ref().map(|base| {
            format!(
                "{}/{}",
                base.trim_end_matches('/'),
                self.telegram.bot_token
            )
        })
    }
}
