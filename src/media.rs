//! Media Downloader and article snapshotter.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;

use crate::driver::Page;
use crate::error::CrawlError;
use crate::formats::FileFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    #[default]
    Best,
    Worst,
    P1080,
    P720,
    P480,
    P360,
}

impl Quality {
    /// Lenient parse: anything unrecognized is `Best`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "worst" => Self::Worst,
            "1080" | "1080p" => Self::P1080,
            "720" | "720p" => Self::P720,
            "480" | "480p" => Self::P480,
            "360" | "360p" => Self::P360,
            _ => Self::Best,
        }
    }

    pub fn height(self) -> Option<u32> {
        match self {
            Self::Best | Self::Worst => None,
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
        }
    }

    /// yt-dlp `-f` selector.
    pub fn format_selector(self) -> String {
        match (self, self.height()) {
            (Self::Worst, _) => "wv+wa/w".to_owned(),
            (_, Some(height)) => format!("bv[height={height}]+ba/b[height={height}]"),
            _ => "bv+ba/b".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRequest {
    pub stream_url: String,
    pub format_selector: String,
    pub directory: PathBuf,
    /// File name without extension; the downloader picks the container.
    pub file_stem: String,
    /// Netscape cookie file carrying the session.
    pub cookies: Option<PathBuf>,
}

#[async_trait]
pub trait MediaDownloader: Send + Sync {
    /// One attempt; retrying is the caller's business.
    async fn download(&self, request: &MediaRequest) -> Result<(), CrawlError>;
}

#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    pub bin: String,
}

impl YtDlpConfig {
    pub fn from_env() -> Self {
        let bin = std::env::var("FACILITO_YTDLP_BIN").unwrap_or_else(|_| "yt-dlp".to_owned());
        Self { bin }
    }
}

#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    config: YtDlpConfig,
}

impl YtDlpDownloader {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    /// Runs `<bin> --version`, failing when the binary is missing or broken.
    pub async fn version(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.config.bin)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("run {} --version", self.config.bin))?;
        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.config.bin, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned())
    }

    fn args(request: &MediaRequest) -> Vec<String> {
        let mut args = vec![
            "-f".to_owned(),
            request.format_selector.clone(),
            "--no-playlist".to_owned(),
            "--newline".to_owned(),
            "--no-progress".to_owned(),
            "-P".to_owned(),
            request.directory.to_string_lossy().to_string(),
            "-o".to_owned(),
            format!("{}.%(ext)s", request.file_stem),
        ];
        if let Some(cookies) = &request.cookies {
            args.push("--cookies".to_owned());
            args.push(cookies.to_string_lossy().to_string());
        }
        args.push(request.stream_url.clone());
        args
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    async fn download(&self, request: &MediaRequest) -> Result<(), CrawlError> {
        tokio::fs::create_dir_all(&request.directory)
            .await
            .map_err(|err| CrawlError::io(&request.directory, err))?;

        tracing::debug!(
            bin = %self.config.bin,
            stream = %request.stream_url,
            dir = %request.directory.display(),
            "yt-dlp"
        );

        let output = Command::new(&self.config.bin)
            .args(Self::args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|err| CrawlError::Download(format!("spawn {}: {err}", self.config.bin)))?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        let tail: Vec<&str> = tail.into_iter().rev().collect();
        Err(CrawlError::Download(format!(
            "yt-dlp failed ({}): {}",
            output.status,
            tail.join(" | ")
        )))
    }
}

#[async_trait]
pub trait Snapshotter: Send + Sync {
    fn format(&self) -> FileFormat;

    /// Writes the current document of `page` to `destination`, returning its size.
    async fn snapshot(&self, page: &dyn Page, destination: &Path) -> Result<u64, CrawlError>;
}

/// Saves the page HTML as served after stripping.
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlSnapshotter;

#[async_trait]
impl Snapshotter for HtmlSnapshotter {
    fn format(&self) -> FileFormat {
        FileFormat::Html
    }

    async fn snapshot(&self, page: &dyn Page, destination: &Path) -> Result<u64, CrawlError> {
        let html = page.content().await?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| CrawlError::io(parent, err))?;
        }
        tokio::fs::write(destination, html.as_bytes())
            .await
            .map_err(|err| CrawlError::io(destination, err))?;
        let metadata = tokio::fs::metadata(destination)
            .await
            .map_err(|err| CrawlError::io(destination, err))?;
        Ok(metadata.len())
    }
}
