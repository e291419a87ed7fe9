//! Repository trait for knowledge graph persistence
//!
//! The graph is a many-to-many relation between questions and knowledge
//! points. Mutation is limited to two atomic single-row operations,
//! [`KnowledgeGraphRepository::get_or_create`] and
//! [`KnowledgeGraphRepository::link`], which must be safe under concurrent
//! callers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::content::Question;
use crate::error::Result;

use super::entity::KnowledgePoint;

/// Repository trait for knowledge graph persistence
#[async_trait]
pub trait KnowledgeGraphRepository: Send + Sync {
    // ========== Point Operations ==========

    /// Look up a point by exact `(name, subject)` and create it if absent.
    ///
    /// Repeated calls with the same pair return the same id.
    async fn get_or_create(&self, name: &str, subject: &str, description: &str) -> Result<String>;

    async fn get_point(&self, id: &str) -> Result<Option<KnowledgePoint>>;

    async fn find_point(&self, name: &str, subject: &str) -> Result<Option<KnowledgePoint>>;

    /// List points, optionally restricted to one subject
    async fn list_points(&self, subject: Option<&str>) -> Result<Vec<KnowledgePoint>>;

    /// Delete a point and, by cascade, its links
    async fn delete_point(&self, id: &str) -> Result<bool>;

    // ========== Link Operations ==========

    /// Link a question to a point. Linking an existing pair is a no-op.
    async fn link(&self, question_id: &str, knowledge_point_id: &str) -> Result<()>;

    async fn points_for_question(&self, question_id: &str) -> Result<Vec<KnowledgePoint>>;

    async fn questions_for_point(&self, knowledge_point_id: &str) -> Result<Vec<Question>>;

    /// Distinct points linked to any question of a document
    async fn points_for_document(&self, document_id: &str) -> Result<Vec<KnowledgePoint>>;

    // ========== Statistics ==========

    async fn stats(&self) -> Result<KnowledgeGraphStats>;
}

/// Knowledge graph statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraphStats {
    pub point_count: u64,
    pub link_count: u64,
    pub subject_count: u64,
}
