//! Content extraction
//!
//! Turns a file path, URL or inline text into plain text plus a
//! [`SourceKind`] label. The label is informational; nothing downstream
//! branches on it.

mod plain_text;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::content::SourceKind;
use crate::error::Result;

pub use plain_text::PlainTextExtractor;

/// Where text should be read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentSource {
    Path(PathBuf),
    Url(String),
    Inline(String),
}

impl ContentSource {
    /// Classify a path-or-URL argument
    pub fn detect(input: &str) -> Self {
        let trimmed = input.trim();
        let lowered = trimmed.to_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            Self::Url(trimmed.to_string())
        } else {
            Self::Path(PathBuf::from(trimmed))
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Path(_) => SourceKind::File,
            Self::Url(_) => SourceKind::Url,
            Self::Inline(_) => SourceKind::Text,
        }
    }
}

/// Plain text pulled out of a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: String,
    pub source_kind: SourceKind,
    /// Path or URL, absent for inline text
    pub source_ref: Option<String>,
    /// Suggested document title, e.g. a file stem
    pub title_hint: Option<String>,
}

#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, source: &ContentSource) -> Result<ExtractedContent>;
}
