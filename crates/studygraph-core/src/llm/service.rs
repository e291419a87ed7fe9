//! The generative text service seam
//!
//! Every pipeline component talks to the model through [`GenerativeService`]
//! so the HTTP client can be swapped for a scripted one in tests.

use async_trait::async_trait;

use crate::error::Result;

/// Whether the caller expects a JSON object or free text back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Json,
    Text,
}

/// A prompt-in, completion-out text service
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Generate a completion for `prompt`
    ///
    /// Implementations return the raw completion text. An empty string is a
    /// valid return value and callers treat it as "no result".
    async fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String>;
}
