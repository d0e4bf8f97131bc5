//! Resolves a hosting-site page URL to a direct media URL via `yt-dlp`.

use std::cmp::Reverse;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ExtractorConfig;

/// Outcome of a single resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Found(String),
    NotFound,
    Failed(String),
}

#[async_trait]
pub trait VideoResolver: Send + Sync {
    async fn resolve(&self, page_url: &str) -> Resolution;
}

/// Subset of the extractor's JSON dump used for URL selection.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub formats: Option<Vec<FormatRecord>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormatRecord {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Pick the direct URL: the top-level `url` when present, otherwise the
/// tallest mp4 format. Equal heights keep list order.
pub fn select_direct_url(info: &ExtractionResult) -> Option<String> {
    if let Some(url) = info.url.as_deref().filter(|u| !u.is_empty()) {
        return Some(url.to_string());
    }

    info.formats
        .as_deref()?
        .iter()
        .filter(|f| f.ext.as_deref() == Some("mp4"))
        .min_by_key(|f| Reverse(f.height.unwrap_or(0)))
        .and_then(|f| f.url.clone())
        .filter(|u| !u.is_empty())
}

pub struct YtDlpResolver {
    config: ExtractorConfig,
}

impl YtDlpResolver {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    fn args(&self, page_url: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "--quiet",
            "--no-warnings",
            "--ignore-config",
            "--skip-download",
            "--dump-single-json",
            "--format",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(self.config.format.clone());
        if !self.config.check_certificates {
            args.push("--no-check-certificates".to_string());
        }
        args.push("--".to_string());
        args.push(page_url.to_string());
        args
    }

    async fn extract(&self, page_url: &str) -> Result<ExtractionResult> {
        let mut command = Command::new(&self.config.binary);
        command.args(self.args(page_url)).kill_on_drop(true);

        let output = match self.config.timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), command.output())
                .await
                .map_err(|_| anyhow::anyhow!("timeout after {secs}s"))?,
            None => command.output().await,
        }
        .with_context(|| format!("Failed to run {}", self.config.binary))?;

        if !output.status.success() {
            anyhow::bail!("{}", last_error_line(&output.stderr));
        }

        parse_dump(&output.stdout)
    }
}

#[async_trait]
impl VideoResolver for YtDlpResolver {
    async fn resolve(&self, page_url: &str) -> Resolution {
        debug!("Resolving {}", page_url);
        match self.extract(page_url).await {
            Ok(info) => match select_direct_url(&info) {
                Some(url) => {
                    info!("Resolved direct URL for {}", page_url);
                    Resolution::Found(url)
                }
                None => {
                    warn!("No direct URL in extractor output for {}", page_url);
                    Resolution::NotFound
                }
            },
            Err(e) => Resolution::Failed(format!("{e:#}")),
        }
    }
}

fn parse_dump(stdout: &[u8]) -> Result<ExtractionResult> {
    serde_json::from_slice(stdout).context("Failed to parse extractor output")
}

/// Last non-empty stderr line, which is where yt-dlp puts its `ERROR:` message.
fn last_error_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .unwrap_or("extractor exited with an error")
        .to_string()
}
