//! Studygraph Core Library
//!
//! This crate provides the core functionality for Studygraph, including:
//! - Classification and segmentation of exam and study text
//! - Per-item enrichment (answers, knowledge points, difficulty)
//! - A deduplicated knowledge-point graph
//! - Mindmap synthesis
//! - Background jobs with durable, pollable status
//! - Storage (SQLite) and LLM integration (OpenAI-compatible API)

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod llm;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::Services;
    pub use crate::config::Config;
    pub use crate::domain::ingest::{IngestReport, IngestRequest};
    pub use crate::domain::jobs::{Job, JobStatus, JobType};
    pub use crate::error::{Error, Result};
}
