//! Classification and segmentation
//!
//! Decides whether a text is an exam or study material, names its subject,
//! and splits it into [`SegmentedItem`]s. Items whose body says they continue
//! the previous item are merged into it, transitively, so a multi-part
//! question reaches enrichment as one unit.
//!
//! ```rust,ignore
//! let engine = ClassificationEngine::new(service);
//! let segmentation = engine.classify_and_segment(&text).await?;
//! for item in &segmentation.items {
//!     println!("{} {}", item.number, item.display_title());
//! }
//! ```

mod engine;
mod entity;
mod merge;

pub use engine::{ClassificationEngine, parse_segmentation};
pub use entity::{ItemType, SegmentedItem, Segmentation};
pub use merge::{has_continuation_marker, merge_continuations};
