use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::PlatformConfig;
use crate::error::CrawlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Article,
    Video,
    Course,
    Bootcamp,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Article => "article",
            Self::Video => "video",
            Self::Course => "course",
            Self::Bootcamp => "bootcamp",
        }
    }

    fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "articulos" => Some(Self::Article),
            "videos" => Some(Self::Video),
            "cursos" => Some(Self::Course),
            "programas" => Some(Self::Bootcamp),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `/<kind>/<slug>` following the platform origin.
static CONTENT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(articulos|videos|cursos|programas)/.+$").expect("valid regex")
});

/// Anchored path shapes rooted at the platform origin.
#[derive(Debug, Clone)]
pub struct UrlClassifier {
    origin: String,
}

impl UrlClassifier {
    pub fn new(config: &PlatformConfig) -> Self {
        Self {
            origin: config.origin(),
        }
    }

    /// `None` means the URL matches no known content shape.
    pub fn classify(&self, url: &str) -> Option<ContentKind> {
        let path = url.strip_prefix(&self.origin)?;
        let captures = CONTENT_PATH.captures(path)?;
        ContentKind::from_path_segment(captures.get(1)?.as_str())
    }

    pub fn expect_kind(&self, url: &str, kind: ContentKind) -> Result<(), CrawlError> {
        match self.classify(url) {
            Some(found) if found == kind => Ok(()),
            _ => Err(CrawlError::invalid_url(url, kind.as_str())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> UrlClassifier {
        UrlClassifier::new(&PlatformConfig::default())
    }

    #[test]
    fn classifies_each_content_shape() {
        let classifier = classifier();
        let cases = [
            (
                "https://codigofacilito.com/articulos/programacion-concurrente",
                ContentKind::Article,
            ),
            ("https://codigofacilito.com/videos/icon", ContentKind::Video),
            (
                "https://codigofacilito.com/cursos/flutter-profesional",
                ContentKind::Course,
            ),
            (
                "https://codigofacilito.com/programas/bootcamp-web",
                ContentKind::Bootcamp,
            ),
        ];
        for (url, kind) in cases {
            assert_eq!(classifier.classify(url), Some(kind), "{url}");
        }
    }

    #[test]
    fn rejects_unanchored_or_foreign_urls() {
        let classifier = classifier();
        assert_eq!(
            classifier.classify("see https://codigofacilito.com/videos/icon"),
            None
        );
        assert_eq!(classifier.classify("https://example.com/videos/icon"), None);
        assert_eq!(classifier.classify("https://codigofacilito.com/videos/"), None);
        assert_eq!(classifier.classify("https://codigofacilito.com/VIDEOS/icon"), None);
        assert_eq!(
            classifier.classify("https://codigofacilitoXcom/videos/icon"),
            None
        );
        assert_eq!(
            classifier.classify("https://codigofacilito.com.evil.org/videos/icon"),
            None
        );
    }

    #[test]
    fn origin_with_regex_metacharacters_is_matched_literally() -> anyhow::Result<()> {
        let config = PlatformConfig::new("http://127.0.0.1:8080", "http://stream.test")?;
        let classifier = UrlClassifier::new(&config);
        assert_eq!(
            classifier.classify("http://127.0.0.1:8080/cursos/git"),
            Some(ContentKind::Course)
        );
        assert_eq!(classifier.classify("http://127a0a0a1:8080/cursos/git"), None);
        Ok(())
    }

    #[test]
    fn expect_kind_reports_the_wanted_shape() {
        let err = classifier()
            .expect_kind("https://codigofacilito.com/videos/icon", ContentKind::Course)
            .unwrap_err();
        assert!(err.to_string().contains("invalid course url"));
    }
}
