//! Static-HTML page driver over `reqwest` and `scraper`.
//!
//! Pages are fetched through the session's cookie jar and parsed on demand; nothing
//! runs scripts, so `eval_script` is unsupported and collapsed regions are
//! taken as already present in the served HTML.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::driver::{Browser, DriverError, Element, Page};
use crate::session::CookieFileSession;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct HttpBrowser {
    client: reqwest::Client,
}

impl HttpBrowser {
    pub fn new(session: Arc<CookieFileSession>, navigation_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(navigation_timeout)
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_provider(session.cookie_store())
            .build()
            .context("build page driver http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn new_page(&self) -> Result<Box<dyn Page>, DriverError> {
        Ok(Box::new(HttpPage {
            client: Some(self.client.clone()),
            url: None,
            html: None,
            closed: false,
        }))
    }
}

#[derive(Debug)]
pub struct HttpPage {
    client: Option<reqwest::Client>,
    url: Option<String>,
    html: Option<String>,
    closed: bool,
}

impl HttpPage {
    /// A page holding `html` that cannot navigate anywhere else.
    pub fn detached(url: &str, html: &str) -> Self {
        Self {
            client: None,
            url: Some(url.to_owned()),
            html: Some(html.to_owned()),
            closed: false,
        }
    }

    fn document(&self) -> Result<&str, DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        self.html.as_deref().ok_or(DriverError::NoDocument)
    }
}

#[async_trait]
impl Page for HttpPage {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::Closed);
        }
        let target = Url::parse(url).map_err(|err| DriverError::Navigation {
            url: url.to_owned(),
            reason: err.to_string(),
        })?;
        let client = self
            .client
            .as_ref()
            .ok_or(DriverError::Unsupported("navigation on a detached page"))?;

        let response = client
            .get(target)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(|err| navigation_error(url, err))?;
        let final_url = response.url().clone();

        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::Navigation {
                url: url.to_owned(),
                reason: format!("status {status}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|err| navigation_error(url, err))?;
        tracing::debug!(url = %final_url, bytes = body.len(), "page loaded");

        self.url = Some(final_url.to_string());
        self.html = Some(body);
        Ok(())
    }

    fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    async fn title(&self) -> Result<String, DriverError> {
        let document = Html::parse_document(self.document()?);
        let selector = parse_selector("title")?;
        Ok(document
            .select(&selector)
            .next()
            .map(|title| title.text().collect::<String>())
            .unwrap_or_default())
    }

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn Element>>, DriverError> {
        let document = Html::parse_document(self.document()?);
        let selector = parse_selector(selector)?;
        Ok(document.select(&selector).next().map(HtmlElement::boxed))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, DriverError> {
        let document = Html::parse_document(self.document()?);
        let selector = parse_selector(selector)?;
        Ok(document.select(&selector).map(HtmlElement::boxed).collect())
    }

    async fn eval_script(&mut self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Err(DriverError::Unsupported("script evaluation"))
    }

    async fn remove_all(&mut self, selector: &str) -> Result<(), DriverError> {
        let mut document = Html::parse_document(self.document()?);
        let selector = parse_selector(selector)?;
        let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
        for id in ids {
            if let Some(mut node) = document.tree.get_mut(id) {
                node.detach();
            }
        }
        self.html = Some(document.html());
        Ok(())
    }

    async fn click_all(&mut self, selector: &str) -> Result<usize, DriverError> {
        self.document()?;
        tracing::trace!(selector, "static page: collapsed regions are already in the document");
        Ok(0)
    }

    async fn content(&self) -> Result<String, DriverError> {
        self.document().map(str::to_owned)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        self.html = None;
        Ok(())
    }
}

fn navigation_error(url: &str, err: reqwest::Error) -> DriverError {
    if err.is_timeout() {
        DriverError::Timeout(url.to_owned())
    } else {
        DriverError::Navigation {
            url: url.to_owned(),
            reason: err.to_string(),
        }
    }
}

fn parse_selector(selector: &str) -> Result<Selector, DriverError> {
    Selector::parse(selector).map_err(|err| DriverError::Selector {
        selector: selector.to_owned(),
        reason: format!("{err:?}"),
    })
}

/// Captured element, kept as its outer HTML and re-parsed per query.
#[derive(Debug, Clone)]
pub struct HtmlElement {
    html: String,
}

impl HtmlElement {
    fn boxed(element: ElementRef<'_>) -> Box<dyn Element> {
        Box::new(Self {
            html: element.html(),
        })
    }

    fn with_element<T>(&self, f: impl FnOnce(ElementRef<'_>) -> T) -> Option<T> {
        let fragment = Html::parse_fragment(&self.html);
        let element = fragment
            .root_element()
            .children()
            .find_map(ElementRef::wrap)?;
        Some(f(element))
    }
}

impl Element for HtmlElement {
    fn text(&self) -> String {
        self.with_element(|el| el.text().collect::<String>())
            .unwrap_or_default()
    }

    fn inner_html(&self) -> String {
        self.with_element(|el| el.inner_html()).unwrap_or_default()
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.with_element(|el| el.value().attr(name).map(str::to_owned))
            .flatten()
    }

    fn query(&self, selector: &str) -> Result<Option<Box<dyn Element>>, DriverError> {
        let selector = parse_selector(selector)?;
        Ok(self
            .with_element(|el| el.select(&selector).next().map(HtmlElement::boxed))
            .flatten())
    }

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, DriverError> {
        let selector = parse_selector(selector)?;
        Ok(self
            .with_element(|el| el.select(&selector).map(HtmlElement::boxed).collect())
            .unwrap_or_default())
    }
}
