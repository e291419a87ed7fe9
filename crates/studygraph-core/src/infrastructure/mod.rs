//! Infrastructure layer
//!
//! Concrete implementations of the domain's collaborator traits: SQLite
//! repositories and the plain text extractor.

pub mod content;
pub mod extractor;
pub mod jobs;
pub mod knowledge;
