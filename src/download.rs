use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio_util::sync::CancellationToken;

use crate::classify::{ContentKind, UrlClassifier};
use crate::cli::DownloadArgs;
use crate::config::PlatformConfig;
use crate::driver::Browser;
use crate::events::{EventSink, TracingSink};
use crate::http_driver::HttpBrowser;
use crate::media::{HtmlSnapshotter, Quality, YtDlpConfig, YtDlpDownloader};
use crate::orchestrator::{Collaborators, Orchestrator, OrchestratorOptions, RetryPolicy};
use crate::report;
use crate::session::CookieFileSession;
use crate::tree::TreeBuilder;

/// Session and page driver shared by every command.
pub(crate) struct Connection {
    pub session: Arc<CookieFileSession>,
    pub browser: Arc<dyn Browser>,
}

pub(crate) async fn connect(cookies: &str, nav_timeout: Duration) -> anyhow::Result<Connection> {
    let session = Arc::new(
        CookieFileSession::load(cookies)
            .await
            .with_context(|| format!("load cookies: {cookies}"))?,
    );
    let browser = HttpBrowser::new(Arc::clone(&session), nav_timeout)?;
    Ok(Connection {
        session,
        browser: Arc::new(browser),
    })
}

pub(crate) fn classify_input(
    config: &PlatformConfig,
    url: &str,
) -> anyhow::Result<ContentKind> {
    UrlClassifier::new(config).classify(url).ok_or_else(|| {
        anyhow::anyhow!(
            "unsupported url: {url} (expected {}/articulos/, /videos/, /cursos/ or /programas/)",
            config.origin()
        )
    })
}

pub async fn run(args: DownloadArgs) -> anyhow::Result<()> {
    let config = Arc::new(PlatformConfig::from_env().context("load platform config")?);
    let kind = classify_input(&config, &args.url)?;
    let nav_timeout = Duration::from_secs(args.nav_timeout_secs.max(1));
    let downloads_dir = PathBuf::from(&args.out);
    let quality = Quality::parse(&args.quality);

    tracing::info!(
        url = %args.url,
        %kind,
        ?quality,
        out = %downloads_dir.display(),
        "download"
    );

    let downloader = YtDlpDownloader::new(YtDlpConfig::from_env());
    if kind != ContentKind::Article {
        let version = downloader.version().await.context(
            "yt-dlp is not available; install it or point FACILITO_YTDLP_BIN at the binary",
        )?;
        tracing::debug!(%version, "yt-dlp found");
    }

    let connection = connect(&args.cookies, nav_timeout).await?;
    let sink: Arc<dyn EventSink> = Arc::new(TracingSink);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received; finishing items already started");
                cancel.cancel();
            }
        }
    });

    let parts = Collaborators {
        browser: Arc::clone(&connection.browser),
        session: connection.session.clone(),
        downloader: Arc::new(downloader),
        snapshotter: Arc::new(HtmlSnapshotter),
        sink: Arc::clone(&sink),
    };
    let options = OrchestratorOptions {
        quality,
        downloads_dir: downloads_dir.clone(),
        retry: RetryPolicy {
            max_attempts: args.retries.max(1),
            delay: Duration::from_millis(args.retry_delay_ms),
        },
        concurrency: args.concurrency.max(1),
        navigation_timeout: nav_timeout,
    };
    let orchestrator =
        Orchestrator::new(Arc::clone(&config), parts, options).with_cancellation(cancel);
    let tree = TreeBuilder::new(Arc::clone(&config), Arc::clone(&connection.browser), sink)
        .with_marker_root(&downloads_dir)
        .with_concurrency(args.class_concurrency);

    let traversal = match kind {
        ContentKind::Video | ContentKind::Article => orchestrator
            .download_single(&args.url)
            .await
            .context("download item")?,
        ContentKind::Course => {
            let mut page = connection.browser.new_page().await.context("open page")?;
            let course = tree.build_course(&args.url, page.as_mut()).await;
            page.close().await.context("close page")?;
            let course = course.context("crawl course")?;
            orchestrator.download_course(&course).await
        }
        ContentKind::Bootcamp => {
            let mut page = connection.browser.new_page().await.context("open page")?;
            let bootcamp = tree.build_bootcamp(&args.url, page.as_mut()).await;
            page.close().await.context("close page")?;
            let bootcamp = bootcamp.context("crawl bootcamp")?;
            orchestrator.download_bootcamp(&bootcamp).await
        }
    };

    print!("{}", report::render(&traversal));

    if let Some(path) = &args.report {
        report::write_failures_jsonl(PathBuf::from(path).as_path(), &traversal.failures)
            .context("write failure report")?;
        tracing::info!(path = %path, failures = traversal.failures.len(), "failure report written");
    }

    Ok(())
}
