//! Domain layer
//!
//! Entities, collaborator traits and the pipeline services built on them.

pub mod content;
pub mod derivation;
pub mod ingest;
pub mod jobs;
pub mod knowledge;
pub mod mindmap;
pub mod segmentation;
