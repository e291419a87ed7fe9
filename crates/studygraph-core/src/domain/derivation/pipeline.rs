//! Per-item derivation
//!
//! For one segmented item the pipeline asks the generative service for an
//! answer, and (when segmentation did not supply them) for knowledge points
//! and a difficulty rating. A failure here is scoped to the item; the
//! caller decides whether to skip it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::content::{Difficulty, GuidanceLevel};
use crate::domain::knowledge::KnowledgePointRef;
use crate::domain::segmentation::{ItemType, SegmentedItem};
use crate::error::{Error, Result};
use crate::llm::{GenerativeService, ResponseFormat, first_str_field, parse_json_response};

use super::sanitize::{sanitize_stem, truncate_chars};

/// Default cap on item body length sent to the model
pub const DEFAULT_MAX_ITEM_CHARS: usize = 4000;

/// Enrichment produced for one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedItem {
    pub answer: String,
    pub knowledge_points: Vec<KnowledgePointRef>,
    pub difficulty: Difficulty,
    pub guidance: GuidanceLevel,
    pub difficulty_rationale: String,
}

impl DerivedItem {
    /// Trimmed, non-empty knowledge point names
    pub fn knowledge_point_names(&self) -> Vec<String> {
        self.knowledge_points
            .iter()
            .filter_map(|p| p.display_name().map(str::to_string))
            .collect()
    }
}

/// Requests answers, tags and ratings for items
#[derive(Clone)]
pub struct DerivationPipeline {
    service: Arc<dyn GenerativeService>,
    max_item_chars: usize,
}

impl DerivationPipeline {
    pub fn new(service: Arc<dyn GenerativeService>) -> Self {
        Self {
            service,
            max_item_chars: DEFAULT_MAX_ITEM_CHARS,
        }
    }

    pub fn with_max_item_chars(mut self, max_item_chars: usize) -> Self {
        self.max_item_chars = max_item_chars.max(1);
        self
    }

    /// Derive the answer, knowledge points and rating for `item`.
    ///
    /// Returns [`Error::ItemDerivationFailed`] when the stem is empty after
    /// sanitization, when the service fails, or when a required part of the
    /// reply is missing. A missing rating is not a failure; it defaults to
    /// `medium`.
    pub async fn derive(&self, item: &SegmentedItem, subject: &str) -> Result<DerivedItem> {
        let stem = sanitize_stem(&item.stem);
        if stem.is_empty() {
            return Err(self.failure(item, "item body is empty after removing answer lines"));
        }
        let stem = truncate_chars(&stem, self.max_item_chars);

        let answer = match item.answer.as_deref().map(str::trim) {
            Some(answer) if !answer.is_empty() => {
                debug!(item = %item.number, "Using answer found in source text");
                answer.to_string()
            }
            _ => self.generate_answer(item, stem, subject).await?,
        };

        let needs_points = item.item_type == ItemType::KnowledgeSection || !item.has_knowledge_hints();
        let needs_rating = item.difficulty.is_none();

        let analysis = if needs_points || needs_rating {
            Some(self.analyze(item, stem, subject).await)
        } else {
            None
        };

        let knowledge_points = if needs_points {
            match &analysis {
                Some(Ok(a)) if !a.knowledge_points.is_empty() => a.knowledge_points.clone(),
                Some(Ok(_)) => {
                    return Err(self.failure(item, "no knowledge points in analysis reply"));
                }
                Some(Err(reason)) => return Err(self.failure(item, reason)),
                None => Vec::new(),
            }
        } else {
            item.knowledge_points.clone()
        };

        let (difficulty, guidance, difficulty_rationale) = match (&analysis, needs_rating) {
            (Some(Ok(a)), true) => (
                a.difficulty.unwrap_or_default(),
                item.guidance.or(a.guidance).unwrap_or_default(),
                a.reason.clone(),
            ),
            (Some(Err(reason)), true) => {
                warn!(item = %item.number, reason = %reason, "Rating unavailable, defaulting to medium");
                (
                    Difficulty::default(),
                    item.guidance.unwrap_or_default(),
                    String::new(),
                )
            }
            _ => (
                item.difficulty.unwrap_or_default(),
                item.guidance.unwrap_or_default(),
                item.difficulty_rationale.clone(),
            ),
        };

        Ok(DerivedItem {
            answer,
            knowledge_points,
            difficulty,
            guidance,
            difficulty_rationale,
        })
    }

    async fn generate_answer(&self, item: &SegmentedItem, stem: &str, subject: &str) -> Result<String> {
        let prompt = build_answer_prompt(item.item_type, stem, subject);
        let response = self
            .service
            .generate(&prompt, ResponseFormat::Text)
            .await
            .map_err(|e| self.failure(item, &format!("answer generation failed: {}", e)))?;

        let answer = response.trim();
        if answer.is_empty() {
            return Err(self.failure(item, "answer generation returned nothing"));
        }
        Ok(answer.to_string())
    }

    /// One JSON request covering knowledge points and rating.
    /// Errors are returned as reasons so the caller can decide severity.
    async fn analyze(
        &self,
        item: &SegmentedItem,
        stem: &str,
        subject: &str,
    ) -> std::result::Result<Analysis, String> {
        let prompt = build_analysis_prompt(item.item_type, stem, subject);
        let response = self
            .service
            .generate(&prompt, ResponseFormat::Json)
            .await
            .map_err(|e| format!("analysis request failed: {}", e))?;

        let value: Value =
            parse_json_response(&response).ok_or_else(|| "analysis reply was not JSON".to_string())?;

        let knowledge_points = ["knowledge_points", "knowledge", "points"]
            .iter()
            .find_map(|key| value.get(*key))
            .map(KnowledgePointRef::list_from_value)
            .unwrap_or_default();

        Ok(Analysis {
            knowledge_points,
            difficulty: first_str_field(&value, &["difficulty"]).and_then(|s| Difficulty::parse(&s)),
            guidance: first_str_field(&value, &["guidance_level", "guidance"])
                .and_then(|s| GuidanceLevel::parse(&s)),
            reason: first_str_field(&value, &["difficulty_reason", "reason"]).unwrap_or_default(),
        })
    }

    fn failure(&self, item: &SegmentedItem, reason: &str) -> Error {
        Error::ItemDerivationFailed {
            item: item.number.clone(),
            reason: reason.to_string(),
        }
    }
}

#[derive(Debug)]
struct Analysis {
    knowledge_points: Vec<KnowledgePointRef>,
    difficulty: Option<Difficulty>,
    guidance: Option<GuidanceLevel>,
    reason: String,
}

fn subject_line(subject: &str) -> String {
    if subject.trim().is_empty() {
        String::new()
    } else {
        format!("Subject: {}\n", subject.trim())
    }
}

fn build_answer_prompt(item_type: ItemType, stem: &str, subject: &str) -> String {
    match item_type {
        ItemType::Question => format!(
            "Answer the following exam question for a student. Give the final answer first, then a short worked explanation.\n{}\nQUESTION:\n{}",
            subject_line(subject),
            stem
        ),
        ItemType::KnowledgeSection => format!(
            "Explain the following study material for a student in a few clear paragraphs.\n{}\nMATERIAL:\n{}",
            subject_line(subject),
            stem
        ),
    }
}

fn build_analysis_prompt(item_type: ItemType, stem: &str, subject: &str) -> String {
    let kind = match item_type {
        ItemType::Question => "exam question",
        ItemType::KnowledgeSection => "piece of study material",
    };
    format!(
        r#"Identify the knowledge points covered by the following {kind} and rate its difficulty.
{subject}
Knowledge points are short concept names (one to four words) a student must know.
Difficulty is one of "simple", "medium", "hard".
Guidance level is how much step-by-step help a student needs: "high", "medium" or "low".

Return JSON:
{{
    "knowledge_points": ["concept one", "concept two"],
    "difficulty": "medium",
    "guidance_level": "medium",
    "difficulty_reason": "one sentence"
}}

TEXT:
{stem}"#,
        subject = subject_line(subject),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    /// Replies by prompt kind and records every prompt it saw
    struct RoutingService {
        answer: std::result::Result<String, String>,
        analysis: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl RoutingService {
        fn new(answer: &str, analysis: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                analysis: Ok(analysis.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn prompt_count(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl GenerativeService for RoutingService {
        async fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let reply = match format {
                ResponseFormat::Text => &self.answer,
                ResponseFormat::Json => &self.analysis,
            };
            reply.clone().map_err(Error::LLMError)
        }
    }

    const ANALYSIS: &str = r#"{"knowledge_points": ["stack", {"name": "LIFO"}], "difficulty": "hard", "guidance_level": "high", "difficulty_reason": "needs an example"}"#;

    #[tokio::test]
    async fn test_question_with_hints_and_rating_needs_one_call() {
        let service = Arc::new(RoutingService::new("A stack is LIFO.", ANALYSIS));
        let pipeline = DerivationPipeline::new(service.clone());

        let item = SegmentedItem::question("1", "What is a stack?")
            .with_knowledge_points(vec![KnowledgePointRef::name("stack")])
            .with_rating(Difficulty::Simple, GuidanceLevel::Low);

        let derived = pipeline.derive(&item, "Data Structures").await.unwrap();
        assert_eq!(derived.answer, "A stack is LIFO.");
        assert_eq!(derived.knowledge_point_names(), vec!["stack"]);
        assert_eq!(derived.difficulty, Difficulty::Simple);
        assert_eq!(service.prompt_count(), 1);
    }

    #[tokio::test]
    async fn test_question_without_hints_requests_analysis() {
        let service = Arc::new(RoutingService::new("Push and pop.", ANALYSIS));
        let pipeline = DerivationPipeline::new(service.clone());

        let item = SegmentedItem::question("2", "How does a stack work?");
        let derived = pipeline.derive(&item, "Data Structures").await.unwrap();

        assert_eq!(derived.knowledge_point_names(), vec!["stack", "LIFO"]);
        assert_eq!(derived.difficulty, Difficulty::Hard);
        assert_eq!(derived.guidance, GuidanceLevel::High);
        assert_eq!(derived.difficulty_rationale, "needs an example");
        assert_eq!(service.prompt_count(), 2);
    }

    #[tokio::test]
    async fn test_prefilled_answer_skips_answer_request() {
        let service = Arc::new(RoutingService::new("unused", ANALYSIS));
        let pipeline = DerivationPipeline::new(service.clone());

        let item = SegmentedItem::question("1", "What is 2+2?")
            .with_answer("4")
            .with_knowledge_points(vec![KnowledgePointRef::name("addition")])
            .with_rating(Difficulty::Simple, GuidanceLevel::Low);

        let derived = pipeline.derive(&item, "Math").await.unwrap();
        assert_eq!(derived.answer, "4");
        assert_eq!(service.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_knowledge_section_always_requests_fresh_points() {
        let service = Arc::new(RoutingService::new("Explained.", ANALYSIS));
        let pipeline = DerivationPipeline::new(service.clone());

        let item = SegmentedItem::knowledge_section("1", "Stacks store items LIFO.")
            .with_knowledge_points(vec![KnowledgePointRef::name("hint from segmentation")])
            .with_rating(Difficulty::Medium, GuidanceLevel::Medium);

        let derived = pipeline.derive(&item, "DS").await.unwrap();
        assert_eq!(derived.knowledge_point_names(), vec!["stack", "LIFO"]);
        // Segmentation's rating wins when present
        assert_eq!(derived.difficulty, Difficulty::Medium);
    }

    #[tokio::test]
    async fn test_answer_lines_stripped_before_prompting() {
        let service = Arc::new(RoutingService::new("LIFO.", ANALYSIS));
        let pipeline = DerivationPipeline::new(service.clone());

        let item = SegmentedItem::question("1", "What is a stack?\nAnswer: secret")
            .with_knowledge_points(vec![KnowledgePointRef::name("stack")])
            .with_rating(Difficulty::Simple, GuidanceLevel::Low);
        pipeline.derive(&item, "DS").await.unwrap();

        let prompts = service.prompts.lock().unwrap();
        assert!(prompts[0].contains("What is a stack?"));
        assert!(!prompts[0].contains("secret"));
    }

    #[tokio::test]
    async fn test_empty_answer_fails_item() {
        let service = Arc::new(RoutingService::new("   ", ANALYSIS));
        let pipeline = DerivationPipeline::new(service);

        let err = pipeline
            .derive(&SegmentedItem::question("7", "Q?"), "DS")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ItemDerivationFailed { ref item, .. } if item == "7"));
        assert!(!err.is_fatal_to_pipeline());
    }

    #[tokio::test]
    async fn test_stem_of_only_labels_fails_item() {
        let service = Arc::new(RoutingService::new("x", ANALYSIS));
        let pipeline = DerivationPipeline::new(service.clone());

        let err = pipeline
            .derive(&SegmentedItem::question("3", "Answer: 12"), "DS")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ItemDerivationFailed { .. }));
        assert_eq!(service.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_analysis_fails_when_points_needed() {
        let service = Arc::new(RoutingService::new("An answer.", "not json at all"));
        let pipeline = DerivationPipeline::new(service);

        let err = pipeline
            .derive(&SegmentedItem::question("4", "What is a heap?"), "DS")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ItemDerivationFailed { ref reason, .. } if reason.contains("JSON")));
    }

    #[tokio::test]
    async fn test_malformed_analysis_defaults_rating_when_points_present() {
        let service = Arc::new(RoutingService::new("An answer.", "not json at all"));
        let pipeline = DerivationPipeline::new(service);

        let item = SegmentedItem::question("5", "What is a heap?")
            .with_knowledge_points(vec![KnowledgePointRef::name("heap")]);
        let derived = pipeline.derive(&item, "DS").await.unwrap();
        assert_eq!(derived.difficulty, Difficulty::Medium);
        assert_eq!(derived.guidance, GuidanceLevel::Medium);
    }

    #[tokio::test]
    async fn test_long_stem_truncated() {
        let service = Arc::new(RoutingService::new("ok", ANALYSIS));
        let pipeline = DerivationPipeline::new(service.clone()).with_max_item_chars(10);

        let item = SegmentedItem::question("1", "abcdefghijklmnopqrstuvwxyz")
            .with_knowledge_points(vec![KnowledgePointRef::name("letters")])
            .with_rating(Difficulty::Simple, GuidanceLevel::Low);
        pipeline.derive(&item, "").await.unwrap();

        let prompts = service.prompts.lock().unwrap();
        assert!(prompts[0].contains("abcdefghij"));
        assert!(!prompts[0].contains("abcdefghijk"));
    }
}
