use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use serde::Serialize;

use crate::classify::ContentKind;
use crate::cli::InspectArgs;
use crate::config::PlatformConfig;
use crate::download::{classify_input, connect};
use crate::events::{EventSink, TracingSink};
use crate::formats::{Bootcamp, BootcampClass, Course, MediaItem, VideoRef};
use crate::leaf::{LeafExtractor, article_path};
use crate::media::{HtmlSnapshotter, Snapshotter};
use crate::tree::TreeBuilder;

#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Preview<'a> {
    Course {
        title: &'a str,
        url: &'a str,
        videos: usize,
        sections: Vec<SectionPreview<'a>>,
    },
    Bootcamp {
        title: &'a str,
        url: &'a str,
        videos: usize,
        modules: Vec<ModulePreview<'a>>,
    },
    Video { item: &'a MediaItem },
    Article {
        title: &'a str,
        url: &'a str,
        /// Name the snapshot would be saved under when downloaded standalone.
        file_name: String,
    },
}

#[derive(Debug, Serialize)]
struct SectionPreview<'a> {
    title: &'a str,
    videos: usize,
    items: &'a [VideoRef],
}

#[derive(Debug, Serialize)]
struct ModulePreview<'a> {
    sequence: u32,
    title: &'a str,
    classes: usize,
    videos: usize,
    items: &'a [BootcampClass],
}

pub fn render_course(course: &Course) -> anyhow::Result<String> {
    let preview = Preview::Course {
        title: &course.title,
        url: &course.source_url,
        videos: course.video_count(),
        sections: course
            .sections
            .iter()
            .map(|section| SectionPreview {
                title: &section.title,
                videos: section.videos.len(),
                items: &section.videos,
            })
            .collect(),
    };
    serde_yaml::to_string(&preview).context("serialize course preview")
}

pub fn render_bootcamp(bootcamp: &Bootcamp) -> anyhow::Result<String> {
    let preview = Preview::Bootcamp {
        title: &bootcamp.title,
        url: &bootcamp.source_url,
        videos: bootcamp.video_count(),
        modules: bootcamp
            .modules
            .iter()
            .map(|module| ModulePreview {
                sequence: module.sequence,
                title: &module.title,
                classes: module.classes.len(),
                videos: module.video_count(),
                items: &module.classes,
            })
            .collect(),
    };
    serde_yaml::to_string(&preview).context("serialize bootcamp preview")
}

pub fn render_video(item: &MediaItem) -> anyhow::Result<String> {
    serde_yaml::to_string(&Preview::Video { item }).context("serialize video preview")
}

pub fn render_article(title: &str, url: &str) -> anyhow::Result<String> {
    let path = article_path(Path::new(""), 0, title, HtmlSnapshotter.format());
    let preview = Preview::Article {
        title,
        url,
        file_name: path.to_string_lossy().to_string(),
    };
    serde_yaml::to_string(&preview).context("serialize article preview")
}

pub async fn run(args: InspectArgs) -> anyhow::Result<()> {
    let config = Arc::new(PlatformConfig::from_env().context("load platform config")?);
    let kind = classify_input(&config, &args.url)?;
    let connection = connect(
        &args.cookies,
        Duration::from_secs(args.nav_timeout_secs.max(1)),
    )
    .await?;
    let sink: Arc<dyn EventSink> = Arc::new(TracingSink);

    let mut page = connection.browser.new_page().await.context("open page")?;
    let rendered = match kind {
        ContentKind::Video => LeafExtractor::new(Arc::clone(&config))
            .extract_video(&args.url, page.as_mut())
            .await
            .context("extract video")
            .and_then(|item| render_video(&item)),
        ContentKind::Article => LeafExtractor::new(Arc::clone(&config))
            .open_article(&args.url, page.as_mut())
            .await
            .context("open article")
            .and_then(|title| render_article(&title, &args.url)),
        ContentKind::Course => {
            TreeBuilder::new(Arc::clone(&config), Arc::clone(&connection.browser), sink)
                .build_course(&args.url, page.as_mut())
                .await
                .context("crawl course")
                .and_then(|course| render_course(&course))
        }
        ContentKind::Bootcamp => {
            TreeBuilder::new(Arc::clone(&config), Arc::clone(&connection.browser), sink)
                .with_concurrency(args.class_concurrency)
                .build_bootcamp(&args.url, page.as_mut())
                .await
                .context("crawl bootcamp")
                .and_then(|bootcamp| render_bootcamp(&bootcamp))
        }
    };
    page.close().await.context("close page")?;

    print!("{}", rendered?);
    Ok(())
}
