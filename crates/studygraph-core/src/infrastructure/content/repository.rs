//! SQLite implementation of the ContentRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::domain::content::{
    ContentRepository, ContentType, Difficulty, Document, GuidanceLevel, Question, SourceKind,
};
use crate::error::{Error, Result};

/// SQLite implementation of the content repository
#[derive(Clone)]
pub struct SqliteContentRepository {
    pool: SqlitePool,
}

impl SqliteContentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentRepository for SqliteContentRepository {
    // ========== Document Operations ==========

    async fn save_document(&self, document: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (
                id, title, content, content_type, subject, source_kind,
                source_ref, summary, quiz, mindmap_code, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                summary = excluded.summary,
                quiz = excluded.quiz,
                mindmap_code = excluded.mindmap_code
            "#,
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.content)
        .bind(document.content_type.as_str())
        .bind(&document.subject)
        .bind(document.source_kind.as_str())
        .bind(&document.source_ref)
        .bind(&document.summary)
        .bind(&document.quiz)
        .bind(&document.mindmap_code)
        .bind(document.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(document_id = %document.id, title = %document.title, "Document saved");
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<Document>> {
        let row: Option<DocumentRow> = sqlx::query_as("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_document()).transpose()
    }

    async fn list_documents(&self, limit: Option<u32>) -> Result<Vec<Document>> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows: Vec<DocumentRow> =
            sqlx::query_as("SELECT * FROM documents ORDER BY created_at DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(|r| r.into_document()).collect()
    }

    async fn update_document_mindmap(&self, id: &str, mindmap_code: &str) -> Result<()> {
        let result = sqlx::query("UPDATE documents SET mindmap_code = ? WHERE id = ?")
            .bind(mindmap_code)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::DocumentNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(document_id = %id, "Document deleted");
        }
        Ok(deleted)
    }

    // ========== Question Operations ==========

    async fn save_question(&self, question: &Question) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO questions (
                id, document_id, ordinal, title, question_text, answer_text, subject,
                difficulty, guidance_level, difficulty_reason, mindmap_code, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                question_text = excluded.question_text,
                answer_text = excluded.answer_text,
                difficulty = excluded.difficulty,
                guidance_level = excluded.guidance_level,
                difficulty_reason = excluded.difficulty_reason,
                mindmap_code = excluded.mindmap_code
            "#,
        )
        .bind(&question.id)
        .bind(&question.document_id)
        .bind(&question.ordinal)
        .bind(&question.title)
        .bind(&question.question_text)
        .bind(&question.answer_text)
        .bind(&question.subject)
        .bind(question.difficulty.as_str())
        .bind(question.guidance_level.as_str())
        .bind(&question.difficulty_reason)
        .bind(&question.mindmap_code)
        .bind(question.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(
            question_id = %question.id,
            document_id = %question.document_id,
            "Question saved"
        );
        Ok(())
    }

    async fn get_question(&self, id: &str) -> Result<Option<Question>> {
        let row: Option<QuestionRow> = sqlx::query_as("SELECT * FROM questions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_question()).transpose()
    }

    async fn list_questions_for_document(&self, document_id: &str) -> Result<Vec<Question>> {
        let rows: Vec<QuestionRow> = sqlx::query_as(
            "SELECT * FROM questions WHERE document_id = ? ORDER BY created_at, rowid",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(|r| r.into_question()).collect()
    }

    async fn update_question_mindmap(&self, id: &str, mindmap_code: &str) -> Result<()> {
        let result = sqlx::query("UPDATE questions SET mindmap_code = ? WHERE id = ?")
            .bind(mindmap_code)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::QuestionNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete_question(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ========== Row Types ==========

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    title: String,
    content: String,
    content_type: String,
    subject: String,
    source_kind: String,
    source_ref: Option<String>,
    summary: Option<String>,
    quiz: Option<String>,
    mindmap_code: Option<String>,
    created_at: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        let content_type = ContentType::parse(&self.content_type)
            .ok_or_else(|| Error::Other(format!("Invalid content type: {}", self.content_type)))?;
        let source_kind = SourceKind::parse(&self.source_kind).unwrap_or_default();

        Ok(Document {
            id: self.id,
            title: self.title,
            content: self.content,
            content_type,
            subject: self.subject,
            source_kind,
            source_ref: self.source_ref,
            summary: self.summary,
            quiz: self.quiz,
            mindmap_code: self.mindmap_code,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

/// Question row, shared with the knowledge graph traversal queries
#[derive(Debug, FromRow)]
pub(crate) struct QuestionRow {
    id: String,
    document_id: String,
    ordinal: String,
    title: String,
    question_text: String,
    answer_text: String,
    subject: String,
    difficulty: String,
    guidance_level: String,
    difficulty_reason: String,
    mindmap_code: Option<String>,
    created_at: String,
}

impl QuestionRow {
    pub(crate) fn into_question(self) -> Result<Question> {
        Ok(Question {
            id: self.id,
            document_id: self.document_id,
            ordinal: self.ordinal,
            title: self.title,
            question_text: self.question_text,
            answer_text: self.answer_text,
            subject: self.subject,
            difficulty: Difficulty::parse(&self.difficulty).unwrap_or_default(),
            guidance_level: GuidanceLevel::parse(&self.guidance_level).unwrap_or_default(),
            difficulty_reason: self.difficulty_reason,
            mindmap_code: self.mindmap_code,
            created_at: parse_timestamp(&self.created_at),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    async fn setup_test_db() -> SqliteContentRepository {
        let db = Database::in_memory().await.expect("Failed to create database");
        SqliteContentRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_save_and_get_document() {
        let repo = setup_test_db().await;

        let doc = Document::new("Lecture 3", "Stacks are LIFO.", ContentType::StudyMaterial, "DS")
            .with_source(SourceKind::File, Some("notes/lecture3.txt".to_string()))
            .with_summary("Stacks");
        repo.save_document(&doc).await.unwrap();

        let loaded = repo.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Lecture 3");
        assert_eq!(loaded.content_type, ContentType::StudyMaterial);
        assert_eq!(loaded.source_kind, SourceKind::File);
        assert_eq!(loaded.source_ref.as_deref(), Some("notes/lecture3.txt"));
        assert_eq!(loaded.summary.as_deref(), Some("Stacks"));
    }

    #[tokio::test]
    async fn test_content_type_is_not_overwritten_on_resave() {
        let repo = setup_test_db().await;

        let mut doc = Document::new("Quiz", "1. Q", ContentType::Exam, "DS");
        repo.save_document(&doc).await.unwrap();

        doc.content_type = ContentType::StudyMaterial;
        doc.title = "Quiz (renamed)".to_string();
        repo.save_document(&doc).await.unwrap();

        let loaded = repo.get_document(&doc.id).await.unwrap().unwrap();
        assert_eq!(loaded.content_type, ContentType::Exam);
        assert_eq!(loaded.title, "Quiz (renamed)");
    }

    #[tokio::test]
    async fn test_question_roundtrip_and_listing_order() {
        let repo = setup_test_db().await;
        let doc = Document::new("Quiz", "...", ContentType::Exam, "DS");
        repo.save_document(&doc).await.unwrap();

        let first = Question::new(&doc.id, "Q1", "What is a stack?")
            .with_ordinal("1")
            .with_answer("A LIFO collection")
            .with_rating(Difficulty::Simple, GuidanceLevel::Low, "recall");
        let second = Question::new(&doc.id, "Q2", "What is a queue?").with_ordinal("2");
        repo.save_question(&first).await.unwrap();
        repo.save_question(&second).await.unwrap();

        let questions = repo.list_questions_for_document(&doc.id).await.unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].ordinal, "1");
        assert_eq!(questions[0].difficulty, Difficulty::Simple);
        assert_eq!(questions[0].answer_text, "A LIFO collection");
        assert_eq!(questions[1].guidance_level, GuidanceLevel::Medium);
    }

    #[tokio::test]
    async fn test_update_mindmaps() {
        let repo = setup_test_db().await;
        let doc = Document::new("Quiz", "...", ContentType::Exam, "DS");
        repo.save_document(&doc).await.unwrap();
        let question = Question::new(&doc.id, "Q1", "What is a stack?");
        repo.save_question(&question).await.unwrap();

        repo.update_question_mindmap(&question.id, "mindmap\n  root((stack))")
            .await
            .unwrap();
        repo.update_document_mindmap(&doc.id, "mindmap\n  root((DS))")
            .await
            .unwrap();

        let q = repo.get_question(&question.id).await.unwrap().unwrap();
        assert!(q.mindmap_code.unwrap().starts_with("mindmap"));
        let d = repo.get_document(&doc.id).await.unwrap().unwrap();
        assert!(d.mindmap_code.unwrap().contains("DS"));

        let err = repo.update_question_mindmap("missing", "x").await.unwrap_err();
        assert!(matches!(err, Error::QuestionNotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_document_cascades() {
        let repo = setup_test_db().await;
        let doc = Document::new("Quiz", "...", ContentType::Exam, "DS");
        repo.save_document(&doc).await.unwrap();
        let question = Question::new(&doc.id, "Q1", "What is a stack?");
        repo.save_question(&question).await.unwrap();

        assert!(repo.delete_document(&doc.id).await.unwrap());
        assert!(repo.get_question(&question.id).await.unwrap().is_none());
        assert!(!repo.delete_document(&doc.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_documents_limit() {
        let repo = setup_test_db().await;
        for i in 0..3 {
            let doc = Document::new(format!("Doc {}", i), "...", ContentType::Exam, "DS");
            repo.save_document(&doc).await.unwrap();
        }

        assert_eq!(repo.list_documents(None).await.unwrap().len(), 3);
        assert_eq!(repo.list_documents(Some(2)).await.unwrap().len(), 2);
    }
}
