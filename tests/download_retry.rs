mod platform_stub;

use std::sync::Arc;
use std::time::Duration;

use facilito_dl::driver::Browser;
use facilito_dl::events::{CollectingSink, CrawlEvent, EventSink};
use facilito_dl::formats::{Course, SectionRef, VideoRef};
use facilito_dl::http_driver::HttpBrowser;
use facilito_dl::media::{HtmlSnapshotter, MediaDownloader};
use facilito_dl::orchestrator::{Collaborators, Orchestrator, OrchestratorOptions, RetryPolicy};
use facilito_dl::session::{CookieFileSession, SessionProvider};
use platform_stub::{PlatformStub, StubDownloader};

struct Harness {
    platform: PlatformStub,
    _temp: tempfile::TempDir,
    session: Arc<CookieFileSession>,
    browser: Arc<dyn Browser>,
    sink: Arc<CollectingSink>,
    options: OrchestratorOptions,
}

impl Harness {
    async fn new() -> anyhow::Result<Self> {
        let platform = PlatformStub::spawn(vec![
            ("/videos/uno", platform_stub::video_page("Uno", 3, 31)),
            ("/videos/dos", platform_stub::video_page("Dos", 3, 32)),
            ("/videos/tres", platform_stub::video_page("Tres", 3, 33)),
        ]);
        let temp = tempfile::TempDir::new()?;
        let session = Arc::new(CookieFileSession::load(temp.path().join(".cookies.txt")).await?);
        let browser: Arc<dyn Browser> =
            Arc::new(HttpBrowser::new(Arc::clone(&session), Duration::from_secs(5))?);
        let options = OrchestratorOptions {
            downloads_dir: temp.path().join("downloads"),
            retry: RetryPolicy {
                max_attempts: 5,
                delay: Duration::ZERO,
            },
            ..OrchestratorOptions::default()
        };
        Ok(Self {
            platform,
            _temp: temp,
            session,
            browser,
            sink: Arc::new(CollectingSink::new()),
            options,
        })
    }

    fn orchestrator(&self, downloader: Arc<StubDownloader>) -> Orchestrator {
        Orchestrator::new(
            Arc::new(self.platform.config()),
            Collaborators {
                browser: Arc::clone(&self.browser),
                session: Arc::clone(&self.session) as Arc<dyn SessionProvider>,
                downloader: downloader as Arc<dyn MediaDownloader>,
                snapshotter: Arc::new(HtmlSnapshotter),
                sink: Arc::clone(&self.sink) as Arc<dyn EventSink>,
            },
            self.options.clone(),
        )
    }

    fn course(&self, slugs: &[&str]) -> Course {
        Course {
            source_url: self.platform.url("/cursos/reintentos"),
            title: "Reintentos".to_owned(),
            sections: vec![SectionRef {
                title: "Unica".to_owned(),
                videos: slugs
                    .iter()
                    .map(|slug| VideoRef {
                        title: title_case(slug),
                        url: self.platform.url(&format!("/videos/{slug}")),
                    })
                    .collect(),
            }],
        }
    }
}

fn title_case(slug: &str) -> String {
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[tokio::test]
async fn item_succeeds_on_the_last_allowed_attempt() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let downloader = Arc::new(StubDownloader::failing_when(|call, _| call < 5));
    let orchestrator = harness.orchestrator(Arc::clone(&downloader));

    let report = orchestrator.download_course(&harness.course(&["uno"])).await;

    assert!(report.is_clean());
    assert_eq!(report.outcomes.len(), 1);
    assert_eq!(report.outcomes[0].attempts_used, 5);
    assert_eq!(downloader.calls(), 5);
    // The item is extracted once and reused by every retry.
    assert_eq!(harness.platform.hits("/videos/uno"), 1);

    let retries: Vec<u32> = harness
        .sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            CrawlEvent::RetryScheduled { attempt, .. } => Some(attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![1, 2, 3, 4]);
    Ok(())
}

#[tokio::test]
async fn exhausted_item_is_reported_and_traversal_continues() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let downloader = Arc::new(StubDownloader::failing_when(|_, request| {
        request.file_stem.ends_with("Dos")
    }));
    let orchestrator = harness.orchestrator(Arc::clone(&downloader));

    let report = orchestrator
        .download_course(&harness.course(&["uno", "dos", "tres"]))
        .await;

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(downloader.calls(), 1 + 5 + 1);

    let failed = &report.outcomes[1];
    assert!(!failed.succeeded);
    assert_eq!(failed.attempts_used, 5);
    assert_eq!(failed.item_path, "Curso - Reintentos / 01. Unica / 02. Dos");

    let failure = &report.failures[0];
    assert_eq!(failure.breadcrumb, "Curso - Reintentos / 01. Unica");
    assert_eq!(failure.title, "Dos");
    assert_eq!(failure.url, harness.platform.url("/videos/dos"));
    assert!(failure.reason.contains("stub failure on call 6"));

    assert!(report.outcomes[2].succeeded);
    assert_eq!(report.outcomes[2].attempts_used, 1);
    Ok(())
}

#[tokio::test]
async fn missing_video_page_fails_without_retrying() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let downloader = Arc::new(StubDownloader::succeeding());
    let orchestrator = harness.orchestrator(Arc::clone(&downloader));

    let report = orchestrator
        .download_course(&harness.course(&["borrado"]))
        .await;

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.outcomes[0].attempts_used, 1);
    assert!(report.failures[0].reason.contains("404"));
    assert_eq!(downloader.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn cancellation_stops_scheduling_new_items() -> anyhow::Result<()> {
    let harness = Harness::new().await?;
    let cancel = tokio_util::sync::CancellationToken::new();
    let downloader = Arc::new(StubDownloader::succeeding().with_hook({
        let cancel = cancel.clone();
        move |call| {
            if call == 1 {
                cancel.cancel();
            }
        }
    }));
    let orchestrator = harness
        .orchestrator(Arc::clone(&downloader))
        .with_cancellation(cancel);

    let report = orchestrator
        .download_course(&harness.course(&["uno", "dos", "tres"]))
        .await;

    assert_eq!(report.outcomes.len(), 1);
    assert!(report.outcomes[0].succeeded, "started items finish");
    assert_eq!(report.cancelled, 2);
    assert_eq!(downloader.calls(), 1);
    assert_eq!(harness.platform.hits("/videos/dos"), 0);

    let cancelled = harness
        .sink
        .events()
        .into_iter()
        .filter(|event| matches!(event, CrawlEvent::ItemCancelled { .. }))
        .count();
    assert_eq!(cancelled, 2);
    Ok(())
}
