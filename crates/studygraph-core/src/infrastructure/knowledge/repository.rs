//! SQLite implementation of the KnowledgeGraphRepository
//!
//! Both mutating operations are single statements, so concurrent writers
//! converge on one row per `(name, subject)` and one row per link.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::content::Question;
use crate::domain::knowledge::{KnowledgeGraphRepository, KnowledgeGraphStats, KnowledgePoint};
use crate::error::{Error, Result};
use crate::infrastructure::content::QuestionRow;

/// SQLite implementation of the knowledge graph repository
#[derive(Clone)]
pub struct SqliteKnowledgeGraphRepository {
    pool: SqlitePool,
}

impl SqliteKnowledgeGraphRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeGraphRepository for SqliteKnowledgeGraphRepository {
    // ========== Point Operations ==========

    async fn get_or_create(&self, name: &str, subject: &str, description: &str) -> Result<String> {
        let candidate_id = Uuid::new_v4().to_string();

        // An existing blank description is filled in; a non-blank one is kept
        sqlx::query(
            r#"
            INSERT INTO knowledge_points (id, name, subject, description, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(name, subject) DO UPDATE SET
                description = excluded.description
            WHERE knowledge_points.description = '' AND excluded.description != ''
            "#,
        )
        .bind(&candidate_id)
        .bind(name)
        .bind(subject)
        .bind(description)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        let (id,): (String,) =
            sqlx::query_as("SELECT id FROM knowledge_points WHERE name = ? AND subject = ?")
                .bind(name)
                .bind(subject)
                .fetch_one(&self.pool)
                .await?;

        if id == candidate_id {
            info!(point_id = %id, name = %name, subject = %subject, "Knowledge point created");
        } else {
            debug!(point_id = %id, name = %name, "Knowledge point reused");
        }
        Ok(id)
    }

    async fn get_point(&self, id: &str) -> Result<Option<KnowledgePoint>> {
        let row: Option<PointRow> = sqlx::query_as("SELECT * FROM knowledge_points WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_point()))
    }

    async fn find_point(&self, name: &str, subject: &str) -> Result<Option<KnowledgePoint>> {
        let row: Option<PointRow> =
            sqlx::query_as("SELECT * FROM knowledge_points WHERE name = ? AND subject = ?")
                .bind(name)
                .bind(subject)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|r| r.into_point()))
    }

    async fn list_points(&self, subject: Option<&str>) -> Result<Vec<KnowledgePoint>> {
        let rows: Vec<PointRow> = match subject {
            Some(subject) => {
                sqlx::query_as("SELECT * FROM knowledge_points WHERE subject = ? ORDER BY name")
                    .bind(subject)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM knowledge_points ORDER BY subject, name")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(|r| r.into_point()).collect())
    }

    async fn delete_point(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM knowledge_points WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(point_id = %id, "Knowledge point deleted");
        }
        Ok(deleted)
    }

    // ========== Link Operations ==========

    async fn link(&self, question_id: &str, knowledge_point_id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO question_knowledge_points (question_id, knowledge_point_id, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(question_id)
        .bind(knowledge_point_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => Error::InvalidInput(
                format!(
                    "cannot link question '{}' to knowledge point '{}': one of them does not exist",
                    question_id, knowledge_point_id
                ),
            ),
            _ => Error::DatabaseError(e),
        })?;

        debug!(
            question_id = %question_id,
            point_id = %knowledge_point_id,
            created = result.rows_affected() > 0,
            "Question linked to knowledge point"
        );
        Ok(())
    }

    async fn points_for_question(&self, question_id: &str) -> Result<Vec<KnowledgePoint>> {
        let rows: Vec<PointRow> = sqlx::query_as(
            r#"
            SELECT kp.* FROM knowledge_points kp
            JOIN question_knowledge_points qkp ON qkp.knowledge_point_id = kp.id
            WHERE qkp.question_id = ?
            ORDER BY kp.name
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_point()).collect())
    }

    async fn questions_for_point(&self, knowledge_point_id: &str) -> Result<Vec<Question>> {
        let rows: Vec<QuestionRow> = sqlx::query_as(
            r#"
            SELECT q.* FROM questions q
            JOIN question_knowledge_points qkp ON qkp.question_id = q.id
            WHERE qkp.knowledge_point_id = ?
            ORDER BY q.created_at
            "#,
        )
        .bind(knowledge_point_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_question()).collect()
    }

    async fn points_for_document(&self, document_id: &str) -> Result<Vec<KnowledgePoint>> {
        let rows: Vec<PointRow> = sqlx::query_as(
            r#"
            SELECT DISTINCT kp.* FROM knowledge_points kp
            JOIN question_knowledge_points qkp ON qkp.knowledge_point_id = kp.id
            JOIN questions q ON q.id = qkp.question_id
            WHERE q.document_id = ?
            ORDER BY kp.name
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_point()).collect())
    }

    // ========== Statistics ==========

    async fn stats(&self) -> Result<KnowledgeGraphStats> {
        let (point_count, subject_count): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COUNT(DISTINCT subject) FROM knowledge_points")
                .fetch_one(&self.pool)
                .await?;
        let (link_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM question_knowledge_points")
            .fetch_one(&self.pool)
            .await?;

        Ok(KnowledgeGraphStats {
            point_count: point_count as u64,
            link_count: link_count as u64,
            subject_count: subject_count as u64,
        })
    }
}

// ========== Row Types ==========

#[derive(Debug, FromRow)]
struct PointRow {
    id: String,
    name: String,
    subject: String,
    description: String,
    created_at: String,
}

impl PointRow {
    fn into_point(self) -> KnowledgePoint {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        KnowledgePoint {
            id: self.id,
            name: self.name,
            subject: self.subject,
            description: self.description,
            created_at,
        }
    }
}
