//! Mindmap retrieval with per-entity caching rules
//!
//! Question mindmaps are cached on the question and reused until a
//! regeneration is requested. Document mindmaps are recomputed on every
//! request. Fallback payloads are never stored.

use std::sync::Arc;

use tracing::info;

use crate::domain::content::ContentRepository;
use crate::domain::knowledge::{KnowledgeGraphManager, KnowledgePointRef};
use crate::error::{Error, Result};

use super::synthesizer::{MindmapSynthesizer, is_fallback};

#[derive(Clone)]
pub struct MindmapService {
    content: Arc<dyn ContentRepository>,
    graph: KnowledgeGraphManager,
    synthesizer: MindmapSynthesizer,
}

impl MindmapService {
    pub fn new(
        content: Arc<dyn ContentRepository>,
        graph: KnowledgeGraphManager,
        synthesizer: MindmapSynthesizer,
    ) -> Self {
        Self {
            content,
            graph,
            synthesizer,
        }
    }

    /// Mindmap of one question's knowledge points
    pub async fn question_mindmap(&self, question_id: &str, regenerate: bool) -> Result<String> {
        let question = self
            .content
            .get_question(question_id)
            .await?
            .ok_or_else(|| Error::QuestionNotFound(question_id.to_string()))?;

        if !regenerate
            && let Some(cached) = question.mindmap_code.as_deref()
            && !cached.trim().is_empty()
        {
            return Ok(cached.to_string());
        }

        let points: Vec<KnowledgePointRef> = self
            .graph
            .points_for_question(question_id)
            .await?
            .iter()
            .map(KnowledgePointRef::from)
            .collect();

        let label = if question.title.trim().is_empty() {
            question.subject.as_str()
        } else {
            question.title.as_str()
        };
        let code = self.synthesizer.synthesize(label, &points).await;

        if !is_fallback(&code) {
            self.content.update_question_mindmap(question_id, &code).await?;
            info!(question_id = %question_id, regenerate = regenerate, "Question mindmap stored");
        }
        Ok(code)
    }

    /// Mindmap of every knowledge point linked to a document's questions.
    /// Always recomputed.
    pub async fn document_mindmap(&self, document_id: &str) -> Result<String> {
        let document = self
            .content
            .get_document(document_id)
            .await?
            .ok_or_else(|| Error::DocumentNotFound(document_id.to_string()))?;

        let points: Vec<KnowledgePointRef> = self
            .graph
            .points_for_document(document_id)
            .await?
            .iter()
            .map(KnowledgePointRef::from)
            .collect();

        self.store_document_mindmap(&document.id, document_label(&document.subject, &document.title), &points)
            .await
    }

    /// Synthesize from an already collected point set and store the result
    /// on the document when it is not the fallback.
    pub async fn store_document_mindmap(
        &self,
        document_id: &str,
        label: &str,
        points: &[KnowledgePointRef],
    ) -> Result<String> {
        let code = self.synthesizer.synthesize(label, points).await;
        if !is_fallback(&code) {
            self.content.update_document_mindmap(document_id, &code).await?;
            info!(document_id = %document_id, points = points.len(), "Document mindmap stored");
        }
        Ok(code)
    }
}

/// Root label for a document mindmap: the subject, else the title
pub fn document_label<'a>(subject: &'a str, title: &'a str) -> &'a str {
    if subject.trim().is_empty() { title } else { subject }
}
