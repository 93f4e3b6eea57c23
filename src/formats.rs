use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Streaming,
    Reading,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub source_url: String,
    /// HLS playlist built from the platform's course and video ids.
    pub stream_locator: String,
    pub title: String,
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Html,
}

impl FileFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Html => "html",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleItem {
    pub source_url: String,
    pub title: String,
    pub file_format: FileFormat,
    pub byte_size: u64,
    pub path: PathBuf,
    pub already_exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRef {
    pub title: String,
    pub videos: Vec<VideoRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub source_url: String,
    pub title: String,
    pub sections: Vec<SectionRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootcampVideoRef {
    /// `0` when the label carried no ordinal.
    pub sequence: u32,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootcampClass {
    pub sequence: u32,
    pub title: String,
    pub url: String,
    pub videos: Vec<BootcampVideoRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootcampModule {
    pub sequence: u32,
    pub title: String,
    pub classes: Vec<BootcampClass>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bootcamp {
    pub source_url: String,
    pub title: String,
    pub modules: Vec<BootcampModule>,
}

impl Course {
    pub fn video_count(&self) -> usize {
        self.sections.iter().map(|section| section.videos.len()).sum()
    }
}

impl BootcampModule {
    pub fn video_count(&self) -> usize {
        self.classes.iter().map(|class| class.videos.len()).sum()
    }
}

impl Bootcamp {
    pub fn video_count(&self) -> usize {
        self.modules.iter().map(BootcampModule::video_count).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    /// Breadcrumb of the item, ending with its own label.
    pub item_path: String,
    pub source_url: String,
    pub succeeded: bool,
    pub attempts_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub breadcrumb: String,
    pub title: String,
    pub url: String,
    pub reason: String,
}
