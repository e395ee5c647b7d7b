//! Document sources.
//!
//! A [`DocumentSource`] yields the documents of one partition. HTML files are
//! reduced to their visible text, anything else is read as UTF-8.

use crate::partition::PartitionKey;
use crate::types::{AppError, Document, Result};
use async_trait::async_trait;
use scraper::{Html, Node};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Metadata field holding the path a document was read from.
pub const SOURCE_FIELD: &str = "source";

/// Supplies the documents belonging to a partition.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn load(&self, key: &PartitionKey) -> Result<Vec<Document>>;
}

/// Every file under a folder, recursively. The key is ignored, which suits
/// single-partition setups.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentSource for DirectorySource {
    async fn load(&self, _key: &PartitionKey) -> Result<Vec<Document>> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await.map_err(|e| {
                AppError::Document(format!("Cannot read directory {}: {}", dir.display(), e))
            })?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| AppError::Document(e.to_string()))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| AppError::Document(e.to_string()))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && !is_hidden(&path) {
                    files.push(path);
                }
            }
        }

        // Directory iteration order is platform dependent.
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            match read_document(&path).await {
                Ok(doc) => documents.push(doc),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable file"),
            }
        }

        debug!(root = %self.root.display(), count = documents.len(), "Loaded directory");
        Ok(documents)
    }
}

/// One file per key, located by substituting `{key}` into a path template,
/// e.g. `./data/UBER/UBER_{key}.html`.
pub struct TemplateSource {
    template: String,
}

impl TemplateSource {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn path_for(&self, key: &PartitionKey) -> PathBuf {
        PathBuf::from(self.template.replace("{key}", key.as_str()))
    }
}

#[async_trait]
impl DocumentSource for TemplateSource {
    async fn load(&self, key: &PartitionKey) -> Result<Vec<Document>> {
        let path = self.path_for(key);
        Ok(vec![read_document(&path).await?])
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}

/// Read one file into a document whose id is its path.
pub async fn read_document(path: &Path) -> Result<Document> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| AppError::Document(format!("Cannot read {}: {}", path.display(), e)))?;
    let raw = String::from_utf8(bytes)
        .map_err(|_| AppError::Document(format!("{} is not valid UTF-8", path.display())))?;

    let is_html = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false);
    let content = if is_html { html_to_text(&raw) } else { raw };

    let source = path.display().to_string();
    let mut doc = Document::new(source.clone(), content).with_metadata(SOURCE_FIELD, source);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        doc = doc.with_metadata("file_name", name);
    }
    Ok(doc)
}

/// Visible text of an HTML document, one text node per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .map(|name| matches!(name, "script" | "style" | "noscript" | "head" | "title"))
            .unwrap_or(false);
        if hidden {
            continue;
        }

        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !collapsed.is_empty() {
            lines.push(collapsed);
        }
    }

    lines.join("\n")
}
