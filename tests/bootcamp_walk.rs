mod platform_stub;

use std::sync::Arc;
use std::time::Duration;

use facilito_dl::driver::Browser;
use facilito_dl::events::{CollectingSink, CrawlEvent, EventSink};
use facilito_dl::http_driver::HttpBrowser;
use facilito_dl::media::{HtmlSnapshotter, MediaDownloader};
use facilito_dl::orchestrator::{Collaborators, Orchestrator, OrchestratorOptions};
use facilito_dl::session::{CookieFileSession, SessionProvider};
use facilito_dl::tree::TreeBuilder;
use platform_stub::{ClassLink, ModuleFixture, PlatformStub, StubDownloader};

fn spawn_bootcamp_platform() -> PlatformStub {
    let bootcamp = platform_stub::bootcamp_page(
        "Bootcamp de Desarrollo Web",
        &[
            ModuleFixture {
                label: "Módulo 1",
                title: "Fundamentos",
                charged: true,
                classes: vec![
                    ClassLink {
                        label: "01- Clase",
                        title: "Html básico",
                        href: "/videos/html-basico",
                    },
                    ClassLink {
                        label: "02- Curso",
                        title: "Git desde cero",
                        href: "/cursos/git",
                    },
                    ClassLink {
                        label: "03- Clase",
                        title: "Css",
                        href: "/videos/css-sin-publicar",
                    },
                ],
            },
            ModuleFixture {
                label: "Módulo 2",
                title: "Backend",
                charged: false,
                classes: Vec::new(),
            },
        ],
    );

    PlatformStub::spawn(vec![
        ("/programas/web", bootcamp),
        (
            "/videos/html-basico",
            platform_stub::class_page(
                "Html básico",
                &[
                    ("Clase 1", "Etiquetas", "/videos/etiquetas"),
                    ("Clase 2", "Formularios", "/videos/formularios"),
                ],
            ),
        ),
        (
            "/videos/etiquetas",
            platform_stub::video_page("Etiquetas", 9, 201),
        ),
        (
            "/videos/formularios",
            platform_stub::video_page("Formularios", 9, 202),
        ),
    ])
}

#[tokio::test]
async fn bootcamp_walk_handles_anomalies_and_missing_pages() -> anyhow::Result<()> {
    let platform = spawn_bootcamp_platform();
    let temp = tempfile::TempDir::new()?;
    let downloads = temp.path().join("downloads");
    let config = Arc::new(platform.config());

    let session = Arc::new(CookieFileSession::load(temp.path().join(".cookies.txt")).await?);
    let browser: Arc<dyn Browser> =
        Arc::new(HttpBrowser::new(Arc::clone(&session), Duration::from_secs(5))?);
    let sink = Arc::new(CollectingSink::new());

    let tree = TreeBuilder::new(
        Arc::clone(&config),
        Arc::clone(&browser),
        Arc::clone(&sink) as Arc<dyn EventSink>,
    )
    .with_marker_root(&downloads)
    .with_concurrency(2);
    let mut page = browser.new_page().await?;
    let bootcamp = tree
        .build_bootcamp(&platform.url("/programas/web"), page.as_mut())
        .await?;
    page.close().await?;

    assert_eq!(bootcamp.title, "Desarrollo Web");
    assert_eq!(bootcamp.modules.len(), 2);

    let fundamentals = &bootcamp.modules[0];
    assert_eq!(fundamentals.sequence, 1);
    let classes: Vec<(u32, &str)> = fundamentals
        .classes
        .iter()
        .map(|class| (class.sequence, class.title.as_str()))
        .collect();
    assert_eq!(classes, vec![(1, "Html básico"), (3, "Css")]);
    assert!(fundamentals.classes.iter().all(|c| !c.url.contains("/cursos/")));

    let videos: Vec<(u32, &str)> = fundamentals.classes[0]
        .videos
        .iter()
        .map(|video| (video.sequence, video.title.as_str()))
        .collect();
    assert_eq!(videos, vec![(1, "Etiquetas"), (2, "Formularios")]);
    assert!(fundamentals.classes[1].videos.is_empty());

    let backend = &bootcamp.modules[1];
    assert_eq!(backend.sequence, 2);
    assert!(backend.classes.is_empty());

    let marker = downloads
        .join("Bootcamp - Desarrollo Web")
        .join("01. Fundamentos")
        .join("02. Git desde cero.txt");
    let notice = std::fs::read_to_string(&marker)?;
    assert!(notice.contains(&platform.url("/cursos/git")));
    assert!(notice.contains("02. Git desde cero"));
    assert_eq!(platform.hits("/cursos/git"), 0);

    let events = sink.events();
    assert!(events.contains(&CrawlEvent::ModuleNotCharged {
        breadcrumb: "Bootcamp - Desarrollo Web / 02. Backend".to_owned(),
    }));
    assert!(events.contains(&CrawlEvent::AnomalyDetected {
        breadcrumb: "Bootcamp - Desarrollo Web / 01. Fundamentos / 02. Git desde cero".to_owned(),
        url: platform.url("/cursos/git"),
        marker: Some(marker.clone()),
    }));
    assert!(events.iter().any(|event| matches!(
        event,
        CrawlEvent::ClassExtractionFailed { breadcrumb, .. }
            if breadcrumb == "Bootcamp - Desarrollo Web / 01. Fundamentos / 03. Css"
    )));

    let downloader = Arc::new(StubDownloader::succeeding());
    let orchestrator = Orchestrator::new(
        Arc::clone(&config),
        Collaborators {
            browser,
            session: session as Arc<dyn SessionProvider>,
            downloader: Arc::clone(&downloader) as Arc<dyn MediaDownloader>,
            snapshotter: Arc::new(HtmlSnapshotter),
            sink: Arc::clone(&sink) as Arc<dyn EventSink>,
        },
        OrchestratorOptions {
            downloads_dir: downloads.clone(),
            ..OrchestratorOptions::default()
        },
    );

    let report = orchestrator.download_bootcamp(&bootcamp).await;

    assert_eq!(report.succeeded(), 2);
    assert!(report.failures.is_empty());
    let paths: Vec<&str> = report.outcomes.iter().map(|o| o.item_path.as_str()).collect();
    assert_eq!(
        paths,
        vec![
            "Bootcamp - Desarrollo Web / 01. Fundamentos / 01. Html básico / 01. Etiquetas",
            "Bootcamp - Desarrollo Web / 01. Fundamentos / 01. Html básico / 02. Formularios",
        ]
    );
    let requests = downloader.requests();
    assert_eq!(
        requests[1].directory,
        downloads
            .join("Bootcamp - Desarrollo Web")
            .join("01. Fundamentos")
            .join("01. Html básico")
    );
    assert_eq!(requests[1].stream_url, "http://stream.test/hls/9/202/playlist.m3u8");
    Ok(())
}

#[tokio::test]
async fn inspecting_without_marker_root_writes_nothing() -> anyhow::Result<()> {
    let platform = spawn_bootcamp_platform();
    let temp = tempfile::TempDir::new()?;
    let session = Arc::new(CookieFileSession::load(temp.path().join(".cookies.txt")).await?);
    let browser: Arc<dyn Browser> =
        Arc::new(HttpBrowser::new(Arc::clone(&session), Duration::from_secs(5))?);
    let sink = Arc::new(CollectingSink::new());

    let tree = TreeBuilder::new(
        Arc::new(platform.config()),
        Arc::clone(&browser),
        Arc::clone(&sink) as Arc<dyn EventSink>,
    );
    let mut page = browser.new_page().await?;
    tree.build_bootcamp(&platform.url("/programas/web"), page.as_mut())
        .await?;

    assert!(platform_stub::files_under(temp.path()).is_empty());
    assert!(sink.events().iter().any(|event| matches!(
        event,
        CrawlEvent::AnomalyDetected { marker: None, .. }
    )));
    Ok(())
}
