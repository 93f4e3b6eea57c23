//! Leaf Extractor: single video and article pages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::breadcrumb::ordinal_label;
use crate::classify::{ContentKind, UrlClassifier};
use crate::config::PlatformConfig;
use crate::driver::Page;
use crate::error::CrawlError;
use crate::formats::{ArticleItem, FileFormat, MediaItem, MediaKind};
use crate::media::Snapshotter;
use crate::normalize::normalize;

const VIDEO_TITLE: &str =
    "h1[class='ibm bold-600 no-margin f-text-22'], h1[class='ibm bold-600 no-margin f-text-48']";
const VIDEO_ID: &str = "input[name='video_id']";
const COURSE_ID: &str = "input[name='course_id']";

/// Regions that are page chrome rather than article content.
const ARTICLE_CHROME: [&str; 3] = [
    "div[class='player-header']",
    "div[class='row f-gap-medium middle-xs']",
    "div[class='player-sidebar relative']",
];

#[derive(Debug, Clone)]
pub struct LeafExtractor {
    config: Arc<PlatformConfig>,
    classifier: UrlClassifier,
}

impl LeafExtractor {
    pub fn new(config: Arc<PlatformConfig>) -> Self {
        let classifier = UrlClassifier::new(&config);
        Self { config, classifier }
    }

    pub fn classifier(&self) -> &UrlClassifier {
        &self.classifier
    }

    /// Navigates to `url` and reads the title and the two ids the stream
    /// locator is built from.
    pub async fn extract_video(
        &self,
        url: &str,
        page: &mut dyn Page,
    ) -> Result<MediaItem, CrawlError> {
        let kind = match self.classifier.classify(url) {
            Some(ContentKind::Video) => MediaKind::Streaming,
            Some(ContentKind::Article) => MediaKind::Reading,
            _ => return Err(CrawlError::invalid_url(url, "video")),
        };

        page.goto(url).await?;

        let title = page
            .query(VIDEO_TITLE)
            .await?
            .map(|el| normalize(&el.text()))
            .filter(|title| !title.is_empty())
            .ok_or_else(|| CrawlError::extraction(url, "title not found"))?;

        let video_id = input_value(page, VIDEO_ID).await?;
        let course_id = input_value(page, COURSE_ID).await?;
        let (Some(video_id), Some(course_id)) = (video_id, course_id) else {
            return Err(CrawlError::extraction(url, "video or course id not found"));
        };

        let stream_locator = self.config.stream_locator(&course_id, &video_id);
        tracing::debug!(%url, %title, %stream_locator, "video extracted");

        Ok(MediaItem {
            id: video_id,
            source_url: url.to_owned(),
            stream_locator,
            title,
            kind,
        })
    }

    /// Navigates to the article, strips page chrome and snapshots it into
    /// `destination_dir` unless a file with the same name is already there.
    pub async fn extract_article_snapshot(
        &self,
        url: &str,
        page: &mut dyn Page,
        destination_dir: &Path,
        sequence: u32,
        snapshotter: &dyn Snapshotter,
    ) -> Result<ArticleItem, CrawlError> {
        let title = self.open_article(url, page).await?;
        let path = article_path(destination_dir, sequence, &title, snapshotter.format());
        save_article(url, &*page, title, path, snapshotter).await
    }

    /// Navigates to the article and strips page chrome. Returns the
    /// normalized page title, which names the saved file.
    pub async fn open_article(&self, url: &str, page: &mut dyn Page) -> Result<String, CrawlError> {
        self.classifier.expect_kind(url, ContentKind::Article)?;

        page.goto(url).await?;
        for selector in ARTICLE_CHROME {
            page.remove_all(selector).await?;
        }

        let title = normalize(&page.title().await?);
        if title.is_empty() {
            return Err(CrawlError::extraction(url, "article has no title"));
        }
        Ok(title)
    }
}

/// `<destination_dir>/<NN. Title>.<ext>`.
pub fn article_path(
    destination_dir: &Path,
    sequence: u32,
    title: &str,
    file_format: FileFormat,
) -> PathBuf {
    destination_dir.join(format!(
        "{}.{}",
        ordinal_label(sequence, title),
        file_format.extension()
    ))
}

/// Snapshots an opened article to `path`, or reports the file already there.
pub async fn save_article(
    url: &str,
    page: &dyn Page,
    title: String,
    path: PathBuf,
    snapshotter: &dyn Snapshotter,
) -> Result<ArticleItem, CrawlError> {
    let file_format = snapshotter.format();
    if let Ok(metadata) = tokio::fs::metadata(&path).await {
        tracing::info!(path = %path.display(), "article already saved; skipping");
        return Ok(ArticleItem {
            source_url: url.to_owned(),
            title,
            file_format,
            byte_size: metadata.len(),
            path,
            already_exists: true,
        });
    }

    let byte_size = snapshotter.snapshot(page, &path).await?;
    Ok(ArticleItem {
        source_url: url.to_owned(),
        title,
        file_format,
        byte_size,
        path,
        already_exists: false,
    })
}

async fn input_value(page: &dyn Page, selector: &str) -> Result<Option<String>, CrawlError> {
    Ok(page
        .query(selector)
        .await?
        .and_then(|el| el.attr("value"))
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty()))
}
