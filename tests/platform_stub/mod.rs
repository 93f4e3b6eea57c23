#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use facilito_dl::config::PlatformConfig;
use facilito_dl::error::CrawlError;
use facilito_dl::media::{MediaDownloader, MediaRequest};

pub const STREAM_BASE_URL: &str = "http://stream.test";

const ITEM_TITLE_CLASS: &str = "ibm f-text-16 bold no-margin-bottom f-top-small";

/// Fake platform serving fixed HTML pages by path.
pub struct PlatformStub {
    pub base_url: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PlatformStub {
    pub fn spawn(pages: Vec<(&str, String)>) -> Self {
        let pages: HashMap<String, String> = pages
            .into_iter()
            .map(|(path, body)| (path.to_owned(), body))
            .collect();
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start platform stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");
        let hits = Arc::new(Mutex::new(HashMap::new()));

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn({
            let hits = Arc::clone(&hits);
            move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    let request = match server.recv_timeout(Duration::from_millis(50)) {
                        Ok(Some(req)) => req,
                        Ok(None) => continue,
                        Err(_) => break,
                    };

                    let url = request.url().to_string();
                    let path = url.split('?').next().unwrap_or(&url).to_owned();
                    *hits.lock().unwrap().entry(path.clone()).or_insert(0) += 1;

                    let response = match pages.get(&path) {
                        Some(body) => {
                            let header = tiny_http::Header::from_bytes(
                                &b"Content-Type"[..],
                                &b"text/html; charset=utf-8"[..],
                            )
                            .expect("build header");
                            tiny_http::Response::from_string(body.clone()).with_header(header)
                        }
                        None => tiny_http::Response::from_string("not found").with_status_code(404),
                    };
                    let _ = request.respond(response);
                }
            }
        });

        Self {
            base_url,
            hits,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn config(&self) -> PlatformConfig {
        PlatformConfig::new(&self.base_url, STREAM_BASE_URL).expect("stub platform config")
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn hits(&self, path: &str) -> usize {
        self.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

impl Drop for PlatformStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn document(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html>\n  <head><title>{title}</title></head>\n  <body>\n{body}\n  </body>\n</html>\n"
    )
}

pub fn video_page(title: &str, course_id: u32, video_id: u32) -> String {
    document(
        &format!("{title} | Código Facilito"),
        &format!(
            r#"    <h1 class="ibm bold-600 no-margin f-text-22">{title}</h1>
    <input type="hidden" name="video_id" value="{video_id}">
    <input type="hidden" name="course_id" value="{course_id}">"#
        ),
    )
}

pub fn article_page(title: &str, content: &str) -> String {
    document(
        title,
        &format!(
            r#"    <div class="player-header">Volver al curso</div>
    <div class="row f-gap-medium middle-xs">autor y fecha</div>
    <article><p>{content}</p></article>
    <div class="player-sidebar relative">temario</div>"#
        ),
    )
}

/// `sections` are `(header, [(title, href)])`; a `None` header renders an
/// empty container.
pub fn course_page(title: &str, sections: Vec<(Option<&str>, Vec<(&str, &str)>)>) -> String {
    let mut body = String::new();
    for (header, links) in sections {
        body.push_str("    <div class=\"f-top-16\">\n");
        if let Some(header) = header {
            body.push_str(&format!("      <h4>{header}</h4>\n"));
        }
        for (link_title, href) in links {
            body.push_str(&format!(
                "      <a href=\"{href}\"><p class=\"{ITEM_TITLE_CLASS}\">{link_title}</p></a>\n"
            ));
        }
        body.push_str("    </div>\n");
    }
    document(title, &body)
}

pub struct ClassLink<'a> {
    pub label: &'a str,
    pub title: &'a str,
    pub href: &'a str,
}

pub struct ModuleFixture<'a> {
    pub label: &'a str,
    pub title: &'a str,
    pub charged: bool,
    pub classes: Vec<ClassLink<'a>>,
}

pub fn bootcamp_page(title: &str, modules: &[ModuleFixture<'_>]) -> String {
    let mut body = String::from("    <ul>\n");
    for module in modules {
        body.push_str("      <li class=\"collection-item f-radius-small\">\n");
        body.push_str(&format!(
            "        <span class=\"f-green-text f-green-text--2 bold h5\">{}</span>\n",
            module.label
        ));
        body.push_str(&format!("        <h4>{}</h4>\n", module.title));
        if !module.charged {
            body.push_str("        <span class=\"bold f-yellow-text\">Próximamente</span>\n");
        }
        for class in &module.classes {
            body.push_str(&format!(
                "        <a href=\"{}\">\n          <p class=\"no-margin h5 bold f-blues-text--2\">{}</p>\n          <p class=\"{ITEM_TITLE_CLASS}\">{}</p>\n        </a>\n",
                class.href, class.label, class.title
            ));
        }
        body.push_str("      </li>\n");
    }
    body.push_str("    </ul>");
    document(title, &body)
}

/// `videos` are `(label, title, href)`.
pub fn class_page(title: &str, videos: &[(&str, &str, &str)]) -> String {
    let mut body =
        String::from("    <div class=\"collapsible-body no-border topics-li\">\n");
    for (label, video_title, href) in videos {
        body.push_str(&format!(
            "      <a href=\"{href}\"><p class=\"no-margin h5 bold f-blues-text\">{label}</p><p class=\"{ITEM_TITLE_CLASS}\">{video_title}</p></a>\n"
        ));
    }
    body.push_str("    </div>");
    document(title, &body)
}

/// Media downloader double: records every request and fails while the
/// predicate says so.
pub struct StubDownloader {
    calls: AtomicU32,
    requests: Mutex<Vec<MediaRequest>>,
    fail_when: Box<dyn Fn(u32, &MediaRequest) -> bool + Send + Sync>,
    on_call: Box<dyn Fn(u32) + Send + Sync>,
}

impl StubDownloader {
    pub fn succeeding() -> Self {
        Self::failing_when(|_, _| false)
    }

    pub fn failing_when(
        fail_when: impl Fn(u32, &MediaRequest) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            fail_when: Box::new(fail_when),
            on_call: Box::new(|_| {}),
        }
    }

    /// Runs `hook` with the 1-based call number before each download.
    pub fn with_hook(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_call = Box::new(hook);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<MediaRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaDownloader for StubDownloader {
    async fn download(&self, request: &MediaRequest) -> Result<(), CrawlError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.on_call)(call);
        self.requests.lock().unwrap().push(request.clone());
        if (self.fail_when)(call, request) {
            return Err(CrawlError::Download(format!("stub failure on call {call}")));
        }
        Ok(())
    }
}

pub fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    files
}
