//! Per-item derivation
//!
//! Turns a [`SegmentedItem`](crate::domain::segmentation::SegmentedItem) into
//! a [`DerivedItem`]: answer text, knowledge points, difficulty and guidance
//! level.
//!
//! Exam questions reuse the knowledge points found during segmentation and
//! only ask for fresh ones when none were found. Study material always asks
//! for fresh ones.

mod pipeline;
mod sanitize;

pub use pipeline::{DEFAULT_MAX_ITEM_CHARS, DerivationPipeline, DerivedItem};
pub use sanitize::{is_answer_label_line, sanitize_stem, truncate_chars};
