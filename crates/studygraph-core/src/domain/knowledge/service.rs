//! Knowledge graph manager
//!
//! Thin service over [`KnowledgeGraphRepository`] that applies name
//! normalization (trim, drop empty) before anything reaches the store.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::content::Question;
use crate::error::{Error, Result};

use super::entity::{KnowledgePoint, KnowledgePointRef};
use super::repository::{KnowledgeGraphRepository, KnowledgeGraphStats};

/// Owns the knowledge-point set and its links to questions
#[derive(Clone)]
pub struct KnowledgeGraphManager {
    repository: Arc<dyn KnowledgeGraphRepository>,
}

impl KnowledgeGraphManager {
    pub fn new(repository: Arc<dyn KnowledgeGraphRepository>) -> Self {
        Self { repository }
    }

    /// Get or create a point by exact name within a subject.
    ///
    /// The name is trimmed first; a blank name is rejected.
    pub async fn get_or_create(&self, name: &str, subject: &str, description: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidInput(
                "knowledge point name must not be empty".to_string(),
            ));
        }
        self.repository
            .get_or_create(name, subject.trim(), description.trim())
            .await
    }

    pub async fn link(&self, question_id: &str, knowledge_point_id: &str) -> Result<()> {
        self.repository.link(question_id, knowledge_point_id).await
    }

    /// Get-or-create every usable point in `points` and link each to the
    /// question, in order. Returns the names touched, without duplicates.
    pub async fn register_for_question(
        &self,
        question_id: &str,
        subject: &str,
        points: &[KnowledgePointRef],
    ) -> Result<Vec<String>> {
        let mut touched: Vec<String> = Vec::with_capacity(points.len());

        for point in points {
            let Some(name) = point.display_name() else {
                debug!(question_id = %question_id, "Skipping blank knowledge point");
                continue;
            };

            let point_id = self
                .repository
                .get_or_create(name, subject.trim(), point.description())
                .await?;
            self.repository.link(question_id, &point_id).await?;

            if !touched.iter().any(|n| n == name) {
                touched.push(name.to_string());
            }
        }

        info!(
            question_id = %question_id,
            point_count = touched.len(),
            "Knowledge points linked to question"
        );
        Ok(touched)
    }

    pub async fn points_for_question(&self, question_id: &str) -> Result<Vec<KnowledgePoint>> {
        self.repository.points_for_question(question_id).await
    }

    pub async fn questions_for_point(&self, knowledge_point_id: &str) -> Result<Vec<Question>> {
        if self.repository.get_point(knowledge_point_id).await?.is_none() {
            return Err(Error::KnowledgePointNotFound(knowledge_point_id.to_string()));
        }
        self.repository.questions_for_point(knowledge_point_id).await
    }

    pub async fn points_for_document(&self, document_id: &str) -> Result<Vec<KnowledgePoint>> {
        self.repository.points_for_document(document_id).await
    }

    pub async fn list_points(&self, subject: Option<&str>) -> Result<Vec<KnowledgePoint>> {
        self.repository.list_points(subject).await
    }

    pub async fn stats(&self) -> Result<KnowledgeGraphStats> {
        self.repository.stats().await
    }
}
