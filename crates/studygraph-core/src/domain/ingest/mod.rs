//! Ingestion: the end-to-end pipeline over one text
//!
//! ```text
//! text ─▶ classify_and_segment ─▶ Document ─▶ for each item:
//!                                               derive ─▶ Question ─▶ link points
//!                                         ─▶ document mindmap
//! ```
//!
//! Items are processed one at a time, in order. Progress is
//! `item_index / total_items`.

mod jobs;
mod service;

pub use jobs::IngestJobHandler;
pub use service::{
    DEFAULT_SUBJECT, IngestProgress, IngestReport, IngestRequest, IngestionService, NoProgress,
};
