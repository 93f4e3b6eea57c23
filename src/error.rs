use std::path::PathBuf;

use thiserror::Error;

use crate::driver::DriverError;
use crate::session::SessionError;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// The input does not have the shape of the expected content kind.
    #[error("invalid {expected} url: {url}")]
    InvalidUrl { url: String, expected: &'static str },

    #[error("extraction failed for {url}: {reason}")]
    Extraction { url: String, reason: String },

    #[error("course walk failed for {url}")]
    Course {
        url: String,
        #[source]
        source: Box<CrawlError>,
    },

    #[error("bootcamp walk failed for {url}")]
    Bootcamp {
        url: String,
        #[source]
        source: Box<CrawlError>,
    },

    #[error("download failed: {0}")]
    Download(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Driver(DriverError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CrawlError {
    pub fn invalid_url(url: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            expected,
        }
    }

    pub fn extraction(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Extraction {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Only media failures and timeouts consume another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Download(_) | Self::Timeout(_))
    }
}

impl From<DriverError> for CrawlError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::Timeout(target) => Self::Timeout(target),
            other => Self::Driver(other),
        }
    }
}
