//! Knowledge graph domain module
//!
//! Knowledge points are subject-scoped concept nodes shared across every
//! document. Questions reference them through link rows; a question never
//! owns a point.
//!
//! ## Data Model
//!
//! - **KnowledgePoint**: a node, deduplicated on exact `(name, subject)`
//! - **KnowledgePointRef**: a point as reported by a model, either a bare
//!   name or a name with a description
//! - **question_knowledge_points**: the many-to-many link relation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use studygraph_core::domain::knowledge::{KnowledgeGraphManager, KnowledgePointRef};
//!
//! let manager = KnowledgeGraphManager::new(repository);
//! let id = manager.get_or_create("stack", "Data Structures", "").await?;
//! manager.link(&question.id, &id).await?;
//!
//! let names = manager
//!     .register_for_question(&question.id, "Data Structures", &[KnowledgePointRef::name("LIFO")])
//!     .await?;
//! ```
//!
//! Name matching is exact after trimming. Near-duplicates such as
//! "Stack" and "stack" become separate nodes.

mod entity;
mod repository;
mod service;

pub use entity::{KnowledgePoint, KnowledgePointRef};
pub use repository::{KnowledgeGraphRepository, KnowledgeGraphStats};
pub use service::KnowledgeGraphManager;
