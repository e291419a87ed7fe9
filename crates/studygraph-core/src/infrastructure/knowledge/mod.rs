//! Knowledge graph infrastructure implementations
//!
//! This module contains the SQLite implementation of the knowledge graph
//! repository trait.

mod repository;

pub use repository::SqliteKnowledgeGraphRepository;
