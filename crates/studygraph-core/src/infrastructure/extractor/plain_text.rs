//! Extractor for UTF-8 text files and inline text

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::content::SourceKind;
use crate::error::{Error, Result};

use super::{ContentExtractor, ContentSource, ExtractedContent};

/// File extensions read as plain text
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "markdown", "text"];

/// Reads plain text only. Binary formats and remote sources are rejected.
#[derive(Debug, Clone, Default)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }

    async fn read_file(&self, path: &Path) -> Result<ExtractedContent> {
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_none_or(|ext| TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
        if !supported {
            return Err(Error::InvalidInput(format!(
                "{} is not a plain text file; convert it to .txt or .md first",
                path.display()
            )));
        }

        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                Error::InvalidInput(format!("file not found: {}", path.display()))
            }
            _ => Error::Io(e),
        })?;
        let text = String::from_utf8(bytes)
            .map_err(|_| Error::InvalidInput(format!("{} is not valid UTF-8", path.display())))?;

        debug!(path = %path.display(), chars = text.chars().count(), "Read text file");

        Ok(ExtractedContent {
            text,
            source_kind: SourceKind::File,
            source_ref: Some(path.display().to_string()),
            title_hint: path
                .file_stem()
                .and_then(|s| s.to_str())
                .map(str::to_string),
        })
    }
}

#[async_trait]
impl ContentExtractor for PlainTextExtractor {
    async fn extract(&self, source: &ContentSource) -> Result<ExtractedContent> {
        let content = match source {
            ContentSource::Path(path) => self.read_file(path).await?,
            ContentSource::Url(url) => {
                return Err(Error::InvalidInput(format!(
                    "fetching {} is not supported; save the page as text and ingest the file",
                    url
                )));
            }
            ContentSource::Inline(text) => ExtractedContent {
                text: text.clone(),
                source_kind: SourceKind::Text,
                source_ref: None,
                title_hint: None,
            },
        };

        if content.text.trim().is_empty() {
            return Err(Error::InvalidInput("source contains no text".to_string()));
        }
        Ok(content)
    }
}
