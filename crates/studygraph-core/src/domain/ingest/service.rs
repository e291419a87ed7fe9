//! Pipeline orchestration: classify, persist, enrich item by item, link

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::domain::content::{ContentRepository, ContentType, Document, Question, SourceKind};
use crate::domain::derivation::DerivationPipeline;
use crate::domain::knowledge::{KnowledgeGraphManager, KnowledgePointRef};
use crate::domain::mindmap::{MindmapService, document_label};
use crate::domain::segmentation::{ClassificationEngine, SegmentedItem};
use crate::error::{Error, Result};

/// Subject used when neither the caller nor the classifier names one
pub const DEFAULT_SUBJECT: &str = "General";

/// Longest title taken from the first line of untitled text
const MAX_DERIVED_TITLE_CHARS: usize = 80;

/// Text to ingest plus its labels
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestRequest {
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub source: SourceKind,
    #[serde(default)]
    pub source_ref: Option<String>,
    /// Overrides the classifier's subject when set
    #[serde(default)]
    pub subject: Option<String>,
    /// Overrides the service default for the document mindmap when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_mindmap: Option<bool>,
}

impl IngestRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_document_mindmap(mut self, enabled: bool) -> Self {
        self.document_mindmap = Some(enabled);
        self
    }

    pub fn with_source(mut self, kind: SourceKind, source_ref: Option<String>) -> Self {
        self.source = kind;
        self.source_ref = source_ref;
        self
    }
}

/// Summary of one ingestion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: String,
    pub content_type: ContentType,
    pub subject: String,
    /// Items after continuation merging
    pub submitted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub question_ids: Vec<String>,
    /// Every knowledge point name touched, in first-seen order
    pub knowledge_points: Vec<String>,
    /// Document mindmap, when one was requested
    pub mindmap: Option<String>,
}

impl IngestReport {
    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }
}

/// Receives progress while a document is processed
#[async_trait]
pub trait IngestProgress: Send + Sync {
    async fn report(&self, percent: u8, message: String);
}

/// Progress sink that discards everything
pub struct NoProgress;

#[async_trait]
impl IngestProgress for NoProgress {
    async fn report(&self, _percent: u8, _message: String) {}
}

/// Runs the full pipeline over one text
#[derive(Clone)]
pub struct IngestionService {
    engine: ClassificationEngine,
    pipeline: DerivationPipeline,
    graph: KnowledgeGraphManager,
    content: Arc<dyn ContentRepository>,
    mindmaps: MindmapService,
    generate_document_mindmap: bool,
}

impl IngestionService {
    pub fn new(
        engine: ClassificationEngine,
        pipeline: DerivationPipeline,
        graph: KnowledgeGraphManager,
        content: Arc<dyn ContentRepository>,
        mindmaps: MindmapService,
    ) -> Self {
        Self {
            engine,
            pipeline,
            graph,
            content,
            mindmaps,
            generate_document_mindmap: true,
        }
    }

    pub fn with_document_mindmap(mut self, enabled: bool) -> Self {
        self.generate_document_mindmap = enabled;
        self
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport> {
        self.ingest_with_progress(request, &NoProgress).await
    }

    /// Ingest `request`, reporting `item_index / total_items` after each item.
    ///
    /// Classification failure aborts before anything is stored. A failed
    /// item is logged and skipped; only store errors stop the loop.
    pub async fn ingest_with_progress(
        &self,
        request: IngestRequest,
        progress: &dyn IngestProgress,
    ) -> Result<IngestReport> {
        if request.text.trim().is_empty() {
            return Err(Error::InvalidInput("nothing to ingest: text is empty".to_string()));
        }

        progress.report(0, "Classifying".to_string()).await;
        let segmentation = self.engine.classify_and_segment(&request.text).await?;

        let subject = request
            .subject
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(segmentation.subject.trim()).filter(|s| !s.is_empty()))
            .unwrap_or(DEFAULT_SUBJECT)
            .to_string();

        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| derive_title(&request.text, &segmentation.items));

        let document = Document::new(title, request.text.clone(), segmentation.content_type, &subject)
            .with_source(request.source, request.source_ref.clone());
        self.content.save_document(&document).await?;

        info!(
            document_id = %document.id,
            content_type = %document.content_type,
            subject = %subject,
            items = segmentation.items.len(),
            "Document created"
        );

        let total = segmentation.items.len();
        let mut question_ids = Vec::with_capacity(total);
        let mut touched: Vec<String> = Vec::new();
        let mut failed = 0usize;

        for (index, item) in segmentation.items.iter().enumerate() {
            match self.process_item(&document.id, item, &subject).await {
                Ok((question_id, names)) => {
                    question_ids.push(question_id);
                    for name in names {
                        if !touched.contains(&name) {
                            touched.push(name);
                        }
                    }
                }
                Err(e) if e.is_fatal_to_pipeline() => {
                    error!(document_id = %document.id, item = %item.number, error = %e, "Ingestion aborted");
                    return Err(e);
                }
                Err(e) => {
                    failed += 1;
                    warn!(document_id = %document.id, item = %item.number, error = %e, "Item skipped");
                }
            }

            let done = index + 1;
            progress
                .report(item_percent(done, total), format!("Processed item {}/{}", done, total))
                .await;
        }

        let wants_mindmap = request
            .document_mindmap
            .unwrap_or(self.generate_document_mindmap);
        let mindmap = if wants_mindmap && !touched.is_empty() {
            progress.report(100, "Synthesizing document mindmap".to_string()).await;
            let points: Vec<KnowledgePointRef> =
                touched.iter().map(|n| KnowledgePointRef::name(n.as_str())).collect();
            Some(
                self.mindmaps
                    .store_document_mindmap(
                        &document.id,
                        document_label(&subject, &document.title),
                        &points,
                    )
                    .await?,
            )
        } else {
            None
        };

        let report = IngestReport {
            document_id: document.id,
            content_type: segmentation.content_type,
            subject,
            submitted: total,
            succeeded: question_ids.len(),
            failed,
            question_ids,
            knowledge_points: touched,
            mindmap,
        };

        info!(
            document_id = %report.document_id,
            submitted = report.submitted,
            succeeded = report.succeeded,
            failed = report.failed,
            knowledge_points = report.knowledge_points.len(),
            "Ingestion finished"
        );
        Ok(report)
    }

    /// Derive, store and link one item. Points are linked before returning
    /// so the next item starts with this one's links in place.
    async fn process_item(
        &self,
        document_id: &str,
        item: &SegmentedItem,
        subject: &str,
    ) -> Result<(String, Vec<String>)> {
        let derived = self.pipeline.derive(item, subject).await?;

        let question = Question::new(document_id, item.display_title(), item.stem.trim())
            .with_ordinal(item.number.clone())
            .with_subject(subject)
            .with_answer(derived.answer.clone())
            .with_rating(
                derived.difficulty,
                derived.guidance,
                derived.difficulty_rationale.clone(),
            );
        self.content.save_question(&question).await?;

        let names = self
            .graph
            .register_for_question(&question.id, subject, &derived.knowledge_points)
            .await?;

        Ok((question.id, names))
    }
}

fn item_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done * 100) / total).min(100) as u8
}

/// First non-blank line of the text, else the first item's title
fn derive_title(text: &str, items: &[SegmentedItem]) -> String {
    let line = text.lines().map(str::trim).find(|l| !l.is_empty());
    match line {
        Some(line) => {
            let mut title: String = line.chars().take(MAX_DERIVED_TITLE_CHARS).collect();
            if line.chars().count() > MAX_DERIVED_TITLE_CHARS {
                title.push_str("...");
            }
            title
        }
        None => items
            .first()
            .map(SegmentedItem::display_title)
            .unwrap_or_else(|| "Untitled".to_string()),
    }
}
