//! File-backed documentation providers for the system message.

use std::path::{Path, PathBuf};

use context_memory::DocsProvider;
use tracing::{info, warn};

/// Documentation text read once from a file.
///
/// A missing or unreadable file yields empty docs.
#[derive(Debug, Clone)]
pub struct FileDocs {
    path: PathBuf,
    text: String,
}

impl FileDocs {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => {
                info!(path = %path.display(), chars = text.len(), "loaded docs");
                text
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "docs file unavailable, using empty docs");
                String::new()
            }
        };
        Self { path, text }
    }

    /// Empty docs when `path` is `None`.
    pub fn optional(path: Option<&Path>) -> Self {
        match path {
            Some(path) => Self::new(path),
            None => Self {
                path: PathBuf::new(),
                text: String::new(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocsProvider for FileDocs {
    fn docs(&self) -> String {
        self.text.clone()
    }
}
