//! Mindmap synthesis
//!
//! Aggregates knowledge points into one diagram request. The diagram is an
//! annotation, not a required artifact, so synthesis returns a renderable
//! string in every case and never an error.

mod jobs;
mod service;
mod synthesizer;

pub use jobs::{DocumentMindmapJobHandler, QuestionMindmapJobHandler};
pub use service::{MindmapService, document_label};
pub use synthesizer::{
    DIAGRAM_PREFIX, MINDMAP_FALLBACK, MindmapSynthesizer, is_fallback, normalize_points,
};
