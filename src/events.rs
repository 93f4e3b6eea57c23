use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CrawlEvent {
    /// A section container without a header.
    SectionSkipped { course: String, index: usize },
    ModuleNotCharged { breadcrumb: String },
    /// A class link with no title element.
    ClassSkipped { breadcrumb: String, reason: String },
    /// A "class" that is a full nested course.
    AnomalyDetected {
        breadcrumb: String,
        url: String,
        marker: Option<PathBuf>,
    },
    MarkerWriteFailed { breadcrumb: String, error: String },
    ClassExtractionFailed { breadcrumb: String, error: String },
    ItemStarted { breadcrumb: String, url: String },
    RetryScheduled {
        breadcrumb: String,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
    ItemSucceeded { breadcrumb: String, attempts: u32 },
    ItemFailed {
        breadcrumb: String,
        url: String,
        attempts: u32,
        error: String,
    },
    ItemCancelled { breadcrumb: String, url: String },
}

/// Observability capability handed down to every component.
pub trait EventSink: Send + Sync {
    fn record(&self, event: CrawlEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: CrawlEvent) {
        match event {
            CrawlEvent::SectionSkipped { course, index } => {
                tracing::debug!(%course, index, "section container has no header; skipped");
            }
            CrawlEvent::ModuleNotCharged { breadcrumb } => {
                tracing::warn!(%breadcrumb, "module not charged yet");
            }
            CrawlEvent::ClassSkipped { breadcrumb, reason } => {
                tracing::error!(%breadcrumb, %reason, "class skipped");
            }
            CrawlEvent::AnomalyDetected {
                breadcrumb,
                url,
                marker,
            } => {
                tracing::warn!(
                    %breadcrumb,
                    %url,
                    marker = ?marker,
                    "class is a full course; left for manual review"
                );
            }
            CrawlEvent::MarkerWriteFailed { breadcrumb, error } => {
                tracing::error!(%breadcrumb, %error, "failed to write anomaly marker");
            }
            CrawlEvent::ClassExtractionFailed { breadcrumb, error } => {
                tracing::error!(%breadcrumb, %error, "class extraction failed; no videos collected");
            }
            CrawlEvent::ItemStarted { breadcrumb, url } => {
                tracing::info!(%breadcrumb, %url, "downloading");
            }
            CrawlEvent::RetryScheduled {
                breadcrumb,
                attempt,
                max_attempts,
                error,
            } => {
                tracing::warn!(%breadcrumb, attempt, max_attempts, %error, "attempt failed; retrying");
            }
            CrawlEvent::ItemSucceeded {
                breadcrumb,
                attempts,
            } => {
                tracing::info!(%breadcrumb, attempts, "done");
            }
            CrawlEvent::ItemFailed {
                breadcrumb,
                url,
                attempts,
                error,
            } => {
                tracing::error!(%breadcrumb, %url, attempts, %error, "unable to download");
            }
            CrawlEvent::ItemCancelled { breadcrumb, url } => {
                tracing::info!(%breadcrumb, %url, "cancelled before start");
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<CrawlEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for CollectingSink {
    fn record(&self, event: CrawlEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
