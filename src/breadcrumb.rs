use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// `NN. Title`, or just `Title` when the sequence is unknown (`0`).
pub fn ordinal_label(sequence: u32, title: &str) -> String {
    match (sequence, title.is_empty()) {
        (0, _) => title.to_owned(),
        (n, true) => format!("{n:02}"),
        (n, false) => format!("{n:02}. {title}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Crumb {
    pub sequence: u32,
    pub title: String,
}

impl Crumb {
    pub fn label(&self) -> String {
        ordinal_label(self.sequence, &self.title)
    }
}

/// Structural path of a node: an optional context directory followed by
/// numbered levels. Extended with [`Breadcrumb::child`], never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    context: Option<String>,
    crumbs: Vec<Crumb>,
}

impl Breadcrumb {
    /// Standalone leaves live directly under the downloads directory.
    pub fn standalone() -> Self {
        Self::default()
    }

    pub fn course(title: &str) -> Self {
        Self {
            context: Some(format!("Curso - {title}")),
            crumbs: Vec::new(),
        }
    }

    pub fn bootcamp(title: &str) -> Self {
        Self {
            context: Some(format!("Bootcamp - {title}")),
            crumbs: Vec::new(),
        }
    }

    pub fn child(&self, sequence: u32, title: &str) -> Self {
        let mut crumbs = self.crumbs.clone();
        crumbs.push(Crumb {
            sequence,
            title: title.to_owned(),
        });
        Self {
            context: self.context.clone(),
            crumbs,
        }
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub fn crumbs(&self) -> &[Crumb] {
        &self.crumbs
    }

    pub fn last(&self) -> Option<&Crumb> {
        self.crumbs.last()
    }

    /// Parent levels only, without the last crumb.
    pub fn parent(&self) -> Self {
        let mut crumbs = self.crumbs.clone();
        crumbs.pop();
        Self {
            context: self.context.clone(),
            crumbs,
        }
    }

    /// `<downloads>/<Context>/<NN. Level>/...` for every crumb.
    pub fn directory(&self, downloads_dir: &Path) -> PathBuf {
        let mut path = downloads_dir.to_path_buf();
        if let Some(context) = &self.context {
            path = path.join(context);
        }
        for crumb in &self.crumbs {
            path = path.join(crumb.label());
        }
        path
    }

    /// Directory of the parent levels plus `<NN. Title>.<ext>` for the last crumb.
    pub fn file_path(&self, downloads_dir: &Path, extension: &str) -> PathBuf {
        let dir = self.parent().directory(downloads_dir);
        let stem = self.last().map(Crumb::label).unwrap_or_default();
        dir.join(format!("{stem}.{extension}"))
    }
}

impl fmt::Display for Breadcrumb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::with_capacity(self.crumbs.len() + 1);
        if let Some(context) = &self.context {
            parts.push(context.clone());
        }
        parts.extend(self.crumbs.iter().map(Crumb::label));
        f.write_str(&parts.join(" / "))
    }
}
