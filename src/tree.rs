//! Tree Builder: course and bootcamp walks.
//!
//! Missing substructure (a header-less section, a module that has not
//! charged, a class page without videos) yields an empty collection plus an
//! event. Only a wrong URL shape or a DOM that breaks mid-walk is an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::breadcrumb::Breadcrumb;
use crate::classify::{ContentKind, UrlClassifier};
use crate::config::PlatformConfig;
use crate::driver::{Browser, Element, Page};
use crate::error::CrawlError;
use crate::events::{CrawlEvent, EventSink};
use crate::formats::{
    Bootcamp, BootcampClass, BootcampModule, BootcampVideoRef, Course, SectionRef, VideoRef,
};
use crate::normalize::{OrdinalPattern, extract_ordinal, normalize};

const COLLAPSED_HEADER: &str = "div[class*='collapsible-header']";

const SECTION_CONTAINER: &str = "div[class='f-top-16']";
const SECTION_HEADER: &str = "h4";
/// Marks a link as a lesson; links without it are decoration.
const ITEM_TITLE: &str = "p[class*='ibm f-text-16 bold no-margin-bottom f-top-small']";

const MODULE_ITEM: &str = "li[class*='f-radius-small']";
const MODULE_NOT_CHARGED: &str = "span[class='bold f-yellow-text']";
const MODULE_NUMBER: &str = "span[class='f-green-text f-green-text--2 bold h5']";
const MODULE_HEADER: &str = "h4";
const CLASS_LABEL: &str = "p[class*='no-margin h5 bold f-blues-text--2']";

const CLASS_TOPICS: &str = "div[class*='collapsible-body no-border topics-li']";
const VIDEO_LABEL: &str = "p[class*='no-margin h5 bold f-blues-text']";

const ANOMALY_BANNER: &str = "  -- CURSO NO CLASE / COURSE, NOT A CLASS --  ";

pub const DEFAULT_CLASS_CONCURRENCY: usize = 4;

#[derive(Clone)]
pub struct TreeBuilder {
    config: Arc<PlatformConfig>,
    classifier: UrlClassifier,
    browser: Arc<dyn Browser>,
    sink: Arc<dyn EventSink>,
    marker_root: Option<PathBuf>,
    concurrency: usize,
}

impl TreeBuilder {
    pub fn new(
        config: Arc<PlatformConfig>,
        browser: Arc<dyn Browser>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let classifier = UrlClassifier::new(&config);
        Self {
            config,
            classifier,
            browser,
            sink,
            marker_root: None,
            concurrency: DEFAULT_CLASS_CONCURRENCY,
        }
    }

    /// Anomaly markers are written under this downloads directory. Without
    /// one the anomaly is only reported.
    pub fn with_marker_root(mut self, downloads_dir: impl Into<PathBuf>) -> Self {
        self.marker_root = Some(downloads_dir.into());
        self
    }

    /// Upper bound on class pages open at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub async fn build_course(&self, url: &str, page: &mut dyn Page) -> Result<Course, CrawlError> {
        self.classifier.expect_kind(url, ContentKind::Course)?;

        page.goto(url).await?;
        let expanded = page.click_all(COLLAPSED_HEADER).await?;
        tracing::debug!(%url, expanded, "course sections expanded");

        let (_, title) = extract_ordinal(&page.title().await?, OrdinalPattern::CourseName);
        let sections = self
            .collect_sections(&*page, &title)
            .await
            .map_err(|source| CrawlError::Course {
                url: url.to_owned(),
                source: Box::new(source),
            })?;

        tracing::info!(
            %url,
            %title,
            sections = sections.len(),
            videos = sections.iter().map(|s| s.videos.len()).sum::<usize>(),
            "course walked"
        );
        Ok(Course {
            source_url: url.to_owned(),
            title,
            sections,
        })
    }

    async fn collect_sections(
        &self,
        page: &dyn Page,
        course_title: &str,
    ) -> Result<Vec<SectionRef>, CrawlError> {
        let containers = page.query_all(SECTION_CONTAINER).await?;
        let mut sections = Vec::with_capacity(containers.len());

        for (index, container) in containers.iter().enumerate() {
            let Some(header) = container.query(SECTION_HEADER)? else {
                self.sink.record(CrawlEvent::SectionSkipped {
                    course: course_title.to_owned(),
                    index,
                });
                continue;
            };

            let mut videos = Vec::new();
            for link in container.query_all("a")? {
                let Some(item_title) = link.query(ITEM_TITLE)? else {
                    continue;
                };
                let url = self.link_target(link.as_ref())?;
                videos.push(VideoRef {
                    title: normalize(&item_title.text()),
                    url,
                });
            }

            sections.push(SectionRef {
                title: normalize(&header.text()),
                videos,
            });
        }

        Ok(sections)
    }

    pub async fn build_bootcamp(
        &self,
        url: &str,
        page: &mut dyn Page,
    ) -> Result<Bootcamp, CrawlError> {
        self.classifier.expect_kind(url, ContentKind::Bootcamp)?;

        page.goto(url).await?;
        let expanded = page.click_all(COLLAPSED_HEADER).await?;
        tracing::debug!(%url, expanded, "bootcamp modules expanded");

        let (_, title) = extract_ordinal(&page.title().await?, OrdinalPattern::BootcampName);
        let root = Breadcrumb::bootcamp(&title);
        let modules = self
            .collect_modules(&*page, &root)
            .await
            .map_err(|source| CrawlError::Bootcamp {
                url: url.to_owned(),
                source: Box::new(source),
            })?;

        tracing::info!(
            %url,
            %title,
            modules = modules.len(),
            videos = modules.iter().map(BootcampModule::video_count).sum::<usize>(),
            "bootcamp walked"
        );
        Ok(Bootcamp {
            source_url: url.to_owned(),
            title,
            modules,
        })
    }

    async fn collect_modules(
        &self,
        page: &dyn Page,
        root: &Breadcrumb,
    ) -> Result<Vec<BootcampModule>, CrawlError> {
        let items = page.query_all(MODULE_ITEM).await?;
        let mut modules = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let sequence = item
                .query(MODULE_NUMBER)?
                .map(|el| extract_ordinal(&el.text(), OrdinalPattern::Module).0)
                .unwrap_or(0);
            let title = item
                .query(MODULE_HEADER)?
                .map(|el| normalize(&el.text()))
                .unwrap_or_default();
            let crumb = root.child(sequence, &title);

            if item.query(MODULE_NOT_CHARGED)?.is_some() {
                self.sink.record(CrawlEvent::ModuleNotCharged {
                    breadcrumb: crumb.to_string(),
                });
                modules.push(BootcampModule {
                    sequence,
                    title,
                    classes: Vec::new(),
                });
                continue;
            }

            if title.is_empty() {
                self.sink.record(CrawlEvent::SectionSkipped {
                    course: root.to_string(),
                    index,
                });
                continue;
            }

            let classes = self.collect_classes(item.as_ref(), &crumb).await?;
            modules.push(BootcampModule {
                sequence,
                title,
                classes,
            });
        }

        Ok(modules)
    }

    async fn collect_classes(
        &self,
        module: &dyn Element,
        module_crumb: &Breadcrumb,
    ) -> Result<Vec<BootcampClass>, CrawlError> {
        struct PendingClass {
            sequence: u32,
            title: String,
            url: String,
            crumb: Breadcrumb,
        }

        let mut pending = Vec::new();
        for link in module.query_all("a")? {
            let label = link
                .query(CLASS_LABEL)?
                .map(|el| el.text())
                .unwrap_or_default();
            let (sequence, class_type) = extract_ordinal(&label, OrdinalPattern::Class);

            let Some(title_el) = link.query(ITEM_TITLE)? else {
                self.sink.record(CrawlEvent::ClassSkipped {
                    breadcrumb: module_crumb.child(sequence, "").to_string(),
                    reason: "class link has no title".to_owned(),
                });
                continue;
            };
            let title = normalize(&title_el.text());
            let url = self.link_target(link.as_ref())?;
            let crumb = module_crumb.child(sequence, &title);

            if class_type.eq_ignore_ascii_case("curso") {
                self.mark_anomaly(&crumb, &url).await;
                continue;
            }

            pending.push(PendingClass {
                sequence,
                title,
                url,
                crumb,
            });
        }

        let concurrency = self.concurrency.min(pending.len().max(1));
        let mut results: Vec<Option<Vec<BootcampVideoRef>>> = vec![None; pending.len()];
        let mut join_set = tokio::task::JoinSet::new();
        let mut next_idx = 0usize;

        while next_idx < pending.len() || !join_set.is_empty() {
            while next_idx < pending.len() && join_set.len() < concurrency {
                let index = next_idx;
                let builder = self.clone();
                let url = pending[index].url.clone();
                let crumb = pending[index].crumb.clone();
                join_set.spawn(async move { (index, builder.class_videos(&url, &crumb).await) });
                next_idx += 1;
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };
            match joined {
                Ok((index, videos)) => results[index] = Some(videos),
                Err(err) => {
                    tracing::error!(module = %module_crumb, error = %err, "class worker panicked");
                }
            }
        }

        Ok(pending
            .into_iter()
            .zip(results)
            .map(|(class, videos)| {
                if videos.is_none() {
                    self.sink.record(CrawlEvent::ClassExtractionFailed {
                        breadcrumb: class.crumb.to_string(),
                        error: "class worker did not finish".to_owned(),
                    });
                }
                BootcampClass {
                    sequence: class.sequence,
                    title: class.title,
                    url: class.url,
                    videos: videos.unwrap_or_default(),
                }
            })
            .collect())
    }

    /// Videos of one class, read from a page of its own. The page is closed
    /// whatever happens; a failure is reported and yields no videos.
    async fn class_videos(&self, url: &str, crumb: &Breadcrumb) -> Vec<BootcampVideoRef> {
        let mut page = match self.browser.new_page().await {
            Ok(page) => page,
            Err(err) => {
                self.sink.record(CrawlEvent::ClassExtractionFailed {
                    breadcrumb: crumb.to_string(),
                    error: err.to_string(),
                });
                return Vec::new();
            }
        };

        let result = self.extract_class_videos(url, page.as_mut()).await;
        if let Err(err) = page.close().await {
            tracing::debug!(%url, error = %err, "close class page");
        }

        match result {
            Ok(videos) => videos,
            Err(err) => {
                self.sink.record(CrawlEvent::ClassExtractionFailed {
                    breadcrumb: crumb.to_string(),
                    error: err.to_string(),
                });
                Vec::new()
            }
        }
    }

    async fn extract_class_videos(
        &self,
        url: &str,
        page: &mut dyn Page,
    ) -> Result<Vec<BootcampVideoRef>, CrawlError> {
        page.goto(url).await?;
        let Some(topics) = page.query(CLASS_TOPICS).await? else {
            return Ok(Vec::new());
        };

        let mut videos = Vec::new();
        for link in topics.query_all("a")? {
            let sequence = link
                .query(VIDEO_LABEL)?
                .map(|el| extract_ordinal(&el.text(), OrdinalPattern::Video).0)
                .unwrap_or(0);
            let title = link
                .query(ITEM_TITLE)?
                .map(|el| normalize(&el.text()))
                .unwrap_or_default();
            let url = self.link_target(link.as_ref())?;
            videos.push(BootcampVideoRef {
                sequence,
                title,
                url,
            });
        }
        Ok(videos)
    }

    async fn mark_anomaly(&self, crumb: &Breadcrumb, url: &str) {
        let marker = match &self.marker_root {
            Some(root) => {
                let path = crumb.file_path(root, "txt");
                match write_marker(&path, crumb, url).await {
                    Ok(()) => Some(path),
                    Err(err) => {
                        self.sink.record(CrawlEvent::MarkerWriteFailed {
                            breadcrumb: crumb.to_string(),
                            error: err.to_string(),
                        });
                        None
                    }
                }
            }
            None => None,
        };
        self.sink.record(CrawlEvent::AnomalyDetected {
            breadcrumb: crumb.to_string(),
            url: url.to_owned(),
            marker,
        });
    }

    fn link_target(&self, link: &dyn Element) -> Result<String, CrawlError> {
        let href = link
            .attr("href")
            .map(|href| href.trim().to_owned())
            .unwrap_or_default();
        if href.is_empty() {
            return Err(CrawlError::extraction(
                link.inner_html(),
                "lesson link has no href",
            ));
        }
        self.config
            .absolute_url(&href)
            .ok_or_else(|| CrawlError::extraction(href.as_str(), "lesson link has unusable href"))
    }
}

/// Plain-text notice left where the class would have been downloaded.
pub fn anomaly_marker_text(crumb: &Breadcrumb, url: &str) -> String {
    let name = crumb.last().map(|c| c.label()).unwrap_or_default();
    format!(
        "{ANOMALY_BANNER}\n\
         En este bootcamp, esta no es una clase sino un curso completo, puede revisarlo:\n\
         In this bootcamp this is not a class but a full course, review it manually:\n\
         Curso / Course: {name} => {url}\n\
         {ANOMALY_BANNER}\n"
    )
}

async fn write_marker(path: &Path, crumb: &Breadcrumb, url: &str) -> Result<(), CrawlError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| CrawlError::io(parent, err))?;
    }
    tokio::fs::write(path, anomaly_marker_text(crumb, url))
        .await
        .map_err(|err| CrawlError::io(path, err))
}
