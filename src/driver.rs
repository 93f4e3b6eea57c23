//! Page Driver capability.
//!
//! The tree builder and leaf extractor only see these traits. An [`Element`]
//! is a captured DOM region: querying it never navigates, so it can be kept
//! while the owning [`Page`] moves on.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation timed out: {0}")]
    Timeout(String),

    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("page driver does not support {0}")]
    Unsupported(&'static str),

    #[error("page has no document loaded")]
    NoDocument,

    #[error("page is closed")]
    Closed,
}

pub trait Element: Send + Sync + std::fmt::Debug {
    /// Rendered text content.
    fn text(&self) -> String;

    fn inner_html(&self) -> String;

    fn attr(&self, name: &str) -> Option<String>;

    fn query(&self, selector: &str) -> Result<Option<Box<dyn Element>>, DriverError>;

    fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, DriverError>;
}

#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<(), DriverError>;

    fn url(&self) -> Option<&str>;

    async fn title(&self) -> Result<String, DriverError>;

    async fn query(&self, selector: &str) -> Result<Option<Box<dyn Element>>, DriverError>;

    async fn query_all(&self, selector: &str) -> Result<Vec<Box<dyn Element>>, DriverError>;

    async fn eval_script(&mut self, script: &str) -> Result<serde_json::Value, DriverError>;

    /// Detaches every node matching `selector` from the document.
    async fn remove_all(&mut self, selector: &str) -> Result<(), DriverError> {
        let script = format!(
            "document.querySelectorAll({}).forEach((el) => el.parentNode.removeChild(el));",
            serde_json::Value::String(selector.to_owned())
        );
        self.eval_script(&script).await?;
        Ok(())
    }

    /// Clicks every node matching `selector`, returning how many were clicked.
    async fn click_all(&mut self, selector: &str) -> Result<usize, DriverError> {
        let script = format!(
            "(() => {{ const els = document.querySelectorAll({}); els.forEach((el) => el.click()); return els.length; }})()",
            serde_json::Value::String(selector.to_owned())
        );
        let clicked = self.eval_script(&script).await?;
        Ok(clicked.as_u64().unwrap_or(0) as usize)
    }

    /// Serialized HTML of the current document.
    async fn content(&self) -> Result<String, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Opens page contexts that share one authenticated session.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn Page>, DriverError>;
}
