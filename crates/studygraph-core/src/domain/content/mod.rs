//! Content domain: documents and the questions segmented out of them
//!
//! ## Data Model
//!
//! - **Document**: one ingested text, classified as exam or study material
//! - **Question**: an enriched item owned by exactly one document
//!
//! Questions carry a difficulty (`simple`/`medium`/`hard`) and a guidance
//! level (`high`/`medium`/`low`); both default to `medium` when unscored.

mod entity;
mod repository;

pub use entity::{ContentType, Difficulty, Document, GuidanceLevel, Question, SourceKind};
pub use repository::ContentRepository;
