//! Download Orchestrator.
//!
//! Flattens a crawled tree into items in document order and drives each one
//! through a bounded number of attempts. A failed item lands in the report;
//! it never stops the traversal.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::breadcrumb::{Breadcrumb, ordinal_label};
use crate::classify::ContentKind;
use crate::config::PlatformConfig;
use crate::driver::{Browser, Page};
use crate::error::CrawlError;
use crate::events::{CrawlEvent, EventSink};
use crate::formats::{ArticleItem, Bootcamp, Course, DownloadOutcome, FailureRecord, MediaItem};
use crate::leaf::{LeafExtractor, article_path, save_article};
use crate::media::{MediaDownloader, MediaRequest, Quality, Snapshotter};
use crate::report::TraversalReport;
use crate::session::SessionProvider;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Pause between a failed attempt and the next one.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub quality: Quality,
    pub downloads_dir: PathBuf,
    pub retry: RetryPolicy,
    /// Items in flight at once; `1` keeps the traversal fully serial.
    pub concurrency: usize,
    pub navigation_timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            quality: Quality::Best,
            downloads_dir: PathBuf::from("downloads"),
            retry: RetryPolicy::default(),
            concurrency: 1,
            navigation_timeout: Duration::from_secs(30),
        }
    }
}

/// External capabilities the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub browser: Arc<dyn Browser>,
    pub session: Arc<dyn SessionProvider>,
    pub downloader: Arc<dyn MediaDownloader>,
    pub snapshotter: Arc<dyn Snapshotter>,
    pub sink: Arc<dyn EventSink>,
}

type LockMap = HashMap<PathBuf, Arc<Mutex<()>>>;

/// One lock per destination so two items never write the same file at once.
/// Entries live only while some item holds or waits on them.
#[derive(Debug, Clone, Default)]
struct DestinationLocks {
    inner: Arc<StdMutex<LockMap>>,
}

impl DestinationLocks {
    async fn acquire(&self, destination: PathBuf) -> DestinationGuard {
        let lock = {
            let mut locks = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(destination.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        DestinationGuard {
            guard: Some(guard),
            destination,
            locks: Arc::clone(&self.inner),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

struct DestinationGuard {
    guard: Option<OwnedMutexGuard<()>>,
    destination: PathBuf,
    locks: Arc<StdMutex<LockMap>>,
}

impl Drop for DestinationGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map holds the only reference once nobody holds or awaits the lock.
        if locks
            .get(&self.destination)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.destination);
        }
    }
}

/// A leaf scheduled for download.
#[derive(Debug, Clone)]
struct Job {
    /// Breadcrumb of the enclosing section, module or class.
    parent: Breadcrumb,
    sequence: u32,
    /// Title from the tree; standalone leaves take the page title instead.
    title: Option<String>,
    url: String,
}

impl Job {
    fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }

    fn crumb(&self) -> Breadcrumb {
        self.parent.child(self.sequence, self.display_title())
    }
}

enum Target {
    Media {
        /// Kept across attempts once extracted.
        item: Option<MediaItem>,
        quality: Quality,
    },
    Article {
        /// Page title once the article has been opened.
        title: Option<String>,
    },
}

#[derive(Clone)]
pub struct Orchestrator {
    leaf: LeafExtractor,
    parts: Collaborators,
    options: OrchestratorOptions,
    cancel: CancellationToken,
    locks: DestinationLocks,
}

impl Orchestrator {
    pub fn new(
        config: Arc<PlatformConfig>,
        parts: Collaborators,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            leaf: LeafExtractor::new(config),
            parts,
            options,
            cancel: CancellationToken::new(),
            locks: DestinationLocks::default(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    /// Downloads an already extracted media item to the file named by the
    /// last crumb of `destination`.
    pub async fn download_leaf(
        &self,
        item: &MediaItem,
        quality: Quality,
        destination: &Breadcrumb,
    ) -> DownloadOutcome {
        let (sequence, title) = destination
            .last()
            .map(|crumb| (crumb.sequence, crumb.title.clone()))
            .unwrap_or_else(|| (0, item.title.clone()));
        let job = Job {
            parent: destination.parent(),
            sequence,
            title: Some(title),
            url: item.source_url.clone(),
        };
        let target = Target::Media {
            item: Some(item.clone()),
            quality,
        };
        self.drive(&job, target).await.0
    }

    /// Sections, then items, both in document order. Item ordinals are their
    /// 1-based position in the section.
    pub async fn download_course(&self, course: &Course) -> TraversalReport {
        let root = Breadcrumb::course(&course.title);
        let mut jobs = Vec::with_capacity(course.video_count());
        for (section_idx, section) in course.sections.iter().enumerate() {
            let parent = root.child(position(section_idx), &section.title);
            for (video_idx, video) in section.videos.iter().enumerate() {
                jobs.push(Job {
                    parent: parent.clone(),
                    sequence: position(video_idx),
                    title: Some(video.title.clone()),
                    url: video.url.clone(),
                });
            }
        }
        tracing::info!(course = %course.title, items = jobs.len(), "course traversal");
        self.traverse(jobs).await
    }

    /// Modules, classes and videos in document order, numbered with the
    /// ordinals read from the page.
    pub async fn download_bootcamp(&self, bootcamp: &Bootcamp) -> TraversalReport {
        let root = Breadcrumb::bootcamp(&bootcamp.title);
        let mut jobs = Vec::with_capacity(bootcamp.video_count());
        for module in &bootcamp.modules {
            let module_crumb = root.child(module.sequence, &module.title);
            for class in &module.classes {
                let parent = module_crumb.child(class.sequence, &class.title);
                for video in &class.videos {
                    jobs.push(Job {
                        parent: parent.clone(),
                        sequence: video.sequence,
                        title: Some(video.title.clone()),
                        url: video.url.clone(),
                    });
                }
            }
        }
        tracing::info!(bootcamp = %bootcamp.title, items = jobs.len(), "bootcamp traversal");
        self.traverse(jobs).await
    }

    /// A single video or article saved directly under the downloads directory.
    pub async fn download_single(&self, url: &str) -> Result<TraversalReport, CrawlError> {
        match self.leaf.classifier().classify(url) {
            Some(ContentKind::Video | ContentKind::Article) => {}
            _ => return Err(CrawlError::invalid_url(url, "video or article")),
        }
        let job = Job {
            parent: Breadcrumb::standalone(),
            sequence: 0,
            title: None,
            url: url.to_owned(),
        };
        Ok(self.traverse(vec![job]).await)
    }

    async fn traverse(&self, jobs: Vec<Job>) -> TraversalReport {
        let total = jobs.len();
        let concurrency = self.options.concurrency.max(1).min(total.max(1));
        let mut results: Vec<Option<(DownloadOutcome, Option<FailureRecord>)>> =
            vec![None; total];
        let mut cancelled = 0usize;
        let mut pending = jobs.into_iter().enumerate();
        let mut join_set = tokio::task::JoinSet::new();

        loop {
            while join_set.len() < concurrency {
                let Some((index, job)) = pending.next() else {
                    break;
                };
                if self.cancel.is_cancelled() {
                    self.parts.sink.record(CrawlEvent::ItemCancelled {
                        breadcrumb: job.crumb().to_string(),
                        url: job.url,
                    });
                    cancelled += 1;
                    continue;
                }
                let this = self.clone();
                join_set.spawn(async move { (index, this.run_job(job).await) });
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(err) => tracing::error!(error = %err, "download worker panicked"),
            }
        }

        let mut report = TraversalReport {
            cancelled,
            ..TraversalReport::default()
        };
        for (outcome, failure) in results.into_iter().flatten() {
            report.outcomes.push(outcome);
            report.failures.extend(failure);
        }
        tracing::info!(
            items = total,
            succeeded = report.succeeded(),
            failed = report.failures.len(),
            cancelled = report.cancelled,
            "traversal finished"
        );
        report
    }

    async fn run_job(&self, job: Job) -> (DownloadOutcome, Option<FailureRecord>) {
        let target = match self.leaf.classifier().classify(&job.url) {
            Some(ContentKind::Video) => Target::Media {
                item: None,
                quality: self.options.quality,
            },
            Some(ContentKind::Article) => Target::Article { title: None },
            _ => {
                let err = CrawlError::invalid_url(&job.url, "video or article");
                return self.fail(&job, &job.crumb(), 0, &err);
            }
        };
        self.drive(&job, target).await
    }

    /// The retry loop. The session is refreshed before every attempt; only
    /// retryable errors consume another attempt.
    async fn drive(&self, job: &Job, mut target: Target) -> (DownloadOutcome, Option<FailureRecord>) {
        let max_attempts = self.options.retry.max_attempts.max(1);
        self.parts.sink.record(CrawlEvent::ItemStarted {
            breadcrumb: job.crumb().to_string(),
            url: job.url.clone(),
        });

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match self.parts.session.refresh().await {
                Ok(cookies) => self.attempt(job, &mut target, cookies).await,
                Err(err) => Err(CrawlError::from(err)),
            };
            let crumb = resolved_crumb(job, &target);

            match result {
                Ok(()) => {
                    self.parts.sink.record(CrawlEvent::ItemSucceeded {
                        breadcrumb: crumb.to_string(),
                        attempts: attempt,
                    });
                    let outcome = DownloadOutcome {
                        item_path: crumb.to_string(),
                        source_url: job.url.clone(),
                        succeeded: true,
                        attempts_used: attempt,
                        error: None,
                    };
                    return (outcome, None);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    self.parts.sink.record(CrawlEvent::RetryScheduled {
                        breadcrumb: crumb.to_string(),
                        attempt,
                        max_attempts,
                        error: err.to_string(),
                    });
                    if !self.options.retry.delay.is_zero() {
                        tokio::time::sleep(self.options.retry.delay).await;
                    }
                }
                Err(err) => return self.fail(job, &crumb, attempt, &err),
            }
        }
    }

    fn fail(
        &self,
        job: &Job,
        crumb: &Breadcrumb,
        attempts: u32,
        err: &CrawlError,
    ) -> (DownloadOutcome, Option<FailureRecord>) {
        let reason = error_chain(err);
        self.parts.sink.record(CrawlEvent::ItemFailed {
            breadcrumb: crumb.to_string(),
            url: job.url.clone(),
            attempts,
            error: reason.clone(),
        });
        let outcome = DownloadOutcome {
            item_path: crumb.to_string(),
            source_url: job.url.clone(),
            succeeded: false,
            attempts_used: attempts,
            error: Some(reason.clone()),
        };
        let failure = FailureRecord {
            breadcrumb: job.parent.to_string(),
            title: crumb
                .last()
                .map(|c| c.title.clone())
                .unwrap_or_else(|| job.display_title().to_owned()),
            url: job.url.clone(),
            reason,
        };
        (outcome, Some(failure))
    }

    async fn attempt(
        &self,
        job: &Job,
        target: &mut Target,
        cookies: PathBuf,
    ) -> Result<(), CrawlError> {
        match target {
            Target::Article { title } => {
                let directory = job.parent.directory(&self.options.downloads_dir);
                let article = self.snapshot_article(job, &directory).await?;
                *title = Some(article.title.clone());
                tracing::debug!(
                    path = %article.path.display(),
                    bytes = article.byte_size,
                    already_exists = article.already_exists,
                    "article saved"
                );
                Ok(())
            }
            Target::Media { item, quality } => {
                let media = match item.take() {
                    Some(media) => media,
                    None => self.extract_media(&job.url).await?,
                };
                let title = job.title.clone().unwrap_or_else(|| media.title.clone());
                let request = MediaRequest {
                    stream_url: media.stream_locator.clone(),
                    format_selector: quality.format_selector(),
                    directory: job.parent.directory(&self.options.downloads_dir),
                    file_stem: ordinal_label(job.sequence, &title),
                    cookies: Some(cookies),
                };
                *item = Some(media);

                let _guard = self
                    .locks
                    .acquire(request.directory.join(&request.file_stem))
                    .await;
                self.parts.downloader.download(&request).await
            }
        }
    }

    async fn extract_media(&self, url: &str) -> Result<MediaItem, CrawlError> {
        let mut page = self.parts.browser.new_page().await?;
        let result = match tokio::time::timeout(
            self.options.navigation_timeout,
            self.leaf.extract_video(url, page.as_mut()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CrawlError::Timeout(url.to_owned())),
        };
        close_quietly(page).await;
        result
    }

    /// Opens the article under the navigation timeout, then saves it while
    /// holding the lock of the file its title names.
    async fn snapshot_article(
        &self,
        job: &Job,
        directory: &Path,
    ) -> Result<ArticleItem, CrawlError> {
        let mut page = self.parts.browser.new_page().await?;
        let opened = match tokio::time::timeout(
            self.options.navigation_timeout,
            self.leaf.open_article(&job.url, page.as_mut()),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CrawlError::Timeout(job.url.clone())),
        };
        let result = match opened {
            Ok(title) => {
                let snapshotter = self.parts.snapshotter.as_ref();
                let path = article_path(directory, job.sequence, &title, snapshotter.format());
                let _guard = self.locks.acquire(path.clone()).await;
                save_article(&job.url, page.as_ref(), title, path, snapshotter).await
            }
            Err(err) => Err(err),
        };
        close_quietly(page).await;
        result
    }
}

fn position(index: usize) -> u32 {
    u32::try_from(index + 1).unwrap_or(u32::MAX)
}

/// Breadcrumb with the page title once a standalone item has been extracted.
fn resolved_crumb(job: &Job, target: &Target) -> Breadcrumb {
    match (&job.title, target) {
        (None, Target::Media { item: Some(media), .. }) => {
            job.parent.child(job.sequence, &media.title)
        }
        (None, Target::Article { title: Some(title) }) => {
            job.parent.child(job.sequence, title)
        }
        _ => job.crumb(),
    }
}

fn error_chain(err: &CrawlError) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

async fn close_quietly(mut page: Box<dyn Page>) {
    if let Err(err) = page.close().await {
        tracing::debug!(error = %err, "close page");
    }
}
