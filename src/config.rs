use std::sync::LazyLock;

use anyhow::Context as _;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://codigofacilito.com";
pub const DEFAULT_STREAM_BASE_URL: &str = "https://video-storage.codigofacilito.com";

// Both defaults are literal absolute URLs.
static DEFAULT_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_BASE_URL).expect("valid default base url"));
static DEFAULT_STREAM_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse(DEFAULT_STREAM_BASE_URL).expect("valid default stream url"));

#[derive(Debug, Clone)]
pub struct PlatformConfig {
    /// Origin every content URL must be rooted at.
    pub base_url: Url,
    /// Origin serving the HLS playlists built from page ids.
    pub stream_base_url: Url,
}

impl PlatformConfig {
    pub fn new(base_url: &str, stream_base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url).with_context(|| format!("parse base url: {base_url}"))?;
        let stream_base_url = Url::parse(stream_base_url)
            .with_context(|| format!("parse stream base url: {stream_base_url}"))?;
        if base_url.host_str().is_none() {
            anyhow::bail!("base url must have host: {base_url}");
        }
        Ok(Self {
            base_url,
            stream_base_url,
        })
    }

    pub fn from_env() -> anyhow::Result<Self> {
        let base_url =
            std::env::var("FACILITO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let stream_base_url = std::env::var("FACILITO_STREAM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_STREAM_BASE_URL.to_owned());
        Self::new(&base_url, &stream_base_url)
    }

    /// Origin without a trailing slash, as it prefixes platform URLs.
    pub fn origin(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_owned()
    }

    /// Resolves an `href` scraped from a platform page.
    pub fn absolute_url(&self, href: &str) -> Option<String> {
        self.base_url.join(href).ok().map(|url| url.to_string())
    }

    pub fn stream_locator(&self, course_id: &str, video_id: &str) -> String {
        format!(
            "{}/hls/{course_id}/{video_id}/playlist.m3u8",
            self.stream_base_url.as_str().trim_end_matches('/')
        )
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE.clone(),
            stream_base_url: DEFAULT_STREAM_BASE.clone(),
        }
    }
}
