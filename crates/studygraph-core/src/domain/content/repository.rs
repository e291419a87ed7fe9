//! Repository trait for documents and questions

use async_trait::async_trait;

use crate::error::Result;

use super::entity::{Document, Question};

/// Persistence for documents and the questions they own
#[async_trait]
pub trait ContentRepository: Send + Sync {
    // ========== Document Operations ==========

    /// Insert a document. Ids are immutable, so saving twice updates only the
    /// mutable annotations (summary, quiz, mindmap).
    async fn save_document(&self, document: &Document) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<Document>>;

    /// List documents, newest first
    async fn list_documents(&self, limit: Option<u32>) -> Result<Vec<Document>>;

    /// Store the latest synthesized mindmap on a document
    async fn update_document_mindmap(&self, id: &str, mindmap_code: &str) -> Result<()>;

    /// Delete a document and, by cascade, its questions and their links
    async fn delete_document(&self, id: &str) -> Result<bool>;

    // ========== Question Operations ==========

    async fn save_question(&self, question: &Question) -> Result<()>;

    async fn get_question(&self, id: &str) -> Result<Option<Question>>;

    async fn list_questions_for_document(&self, document_id: &str) -> Result<Vec<Question>>;

    /// Cache a mindmap on a question
    async fn update_question_mindmap(&self, id: &str, mindmap_code: &str) -> Result<()>;

    async fn delete_question(&self, id: &str) -> Result<bool>;
}
