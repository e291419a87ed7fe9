//! Classification and segmentation engine
//!
//! One request to the generative service decides the content type and
//! subject and splits the text into items. The reply is parsed tolerantly,
//! then continuation items are merged.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::domain::content::{ContentType, Difficulty, GuidanceLevel};
use crate::domain::knowledge::KnowledgePointRef;
use crate::error::{Error, Result};
use crate::llm::{GenerativeService, ResponseFormat, first_str_field, parse_json_response};

use super::entity::{ItemType, SegmentedItem, Segmentation};
use super::merge::merge_continuations;

/// Confidence reported when the model omits one
const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Classifies raw text and splits it into items
#[derive(Clone)]
pub struct ClassificationEngine {
    service: Arc<dyn GenerativeService>,
}

impl ClassificationEngine {
    pub fn new(service: Arc<dyn GenerativeService>) -> Self {
        Self { service }
    }

    /// Classify `text` and split it into merged items.
    ///
    /// Fails with [`Error::ClassificationFailed`] when the service errors or
    /// returns nothing parsable. There is no partial result.
    pub async fn classify_and_segment(&self, text: &str) -> Result<Segmentation> {
        if text.trim().is_empty() {
            return Err(Error::InvalidInput("cannot classify empty text".to_string()));
        }

        info!(chars = text.chars().count(), "Classifying and segmenting text");

        let prompt = build_segmentation_prompt(text);
        let response = self
            .service
            .generate(&prompt, ResponseFormat::Json)
            .await
            .map_err(|e| Error::ClassificationFailed(format!("generative service error: {}", e)))?;

        let segmentation = parse_segmentation(&response, text)?;

        info!(
            content_type = %segmentation.content_type,
            subject = %segmentation.subject,
            items = segmentation.items.len(),
            confidence = segmentation.confidence,
            "Text segmented"
        );
        Ok(segmentation)
    }
}

/// Turn a raw model reply into a [`Segmentation`], merging continuations.
///
/// `source_text` backs the single-item fallback used when the reply
/// classifies the text but lists no items.
pub fn parse_segmentation(response: &str, source_text: &str) -> Result<Segmentation> {
    let value: Value = parse_json_response(response).ok_or_else(|| {
        Error::ClassificationFailed("model returned no parsable JSON".to_string())
    })?;
    if !value.is_object() {
        return Err(Error::ClassificationFailed(
            "model returned JSON that is not an object".to_string(),
        ));
    }

    let declared_type = first_str_field(&value, &["content_type", "type", "document_type"])
        .and_then(|s| ContentType::parse(&s));

    let raw_items = ["items", "questions", "sections"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_array))
        .cloned()
        .unwrap_or_default();

    let default_item_type = match declared_type {
        Some(ContentType::StudyMaterial) => ItemType::KnowledgeSection,
        _ => ItemType::Question,
    };

    let mut items = Vec::with_capacity(raw_items.len());
    for (index, raw) in raw_items.iter().enumerate() {
        match parse_item(raw, index, default_item_type) {
            Some(item) => items.push(item),
            None => warn!(index = index, "Dropping segmented item without body text"),
        }
    }

    let content_type = match declared_type {
        Some(content_type) => content_type,
        None if items.is_empty() => {
            return Err(Error::ClassificationFailed(
                "reply carried neither a content type nor any items".to_string(),
            ));
        }
        None if items.iter().any(|i| i.item_type == ItemType::Question) => ContentType::Exam,
        None => ContentType::StudyMaterial,
    };

    if items.is_empty() {
        warn!("Classifier returned no items, treating the whole text as one item");
        let item_type = match content_type {
            ContentType::Exam => ItemType::Question,
            ContentType::StudyMaterial => ItemType::KnowledgeSection,
        };
        let mut item = SegmentedItem::question("1", source_text.trim());
        item.item_type = item_type;
        items.push(item);
    }

    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| (c as f32).clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE);

    let before = items.len();
    let items = merge_continuations(items);
    if items.len() < before {
        info!(before = before, after = items.len(), "Continuation items merged");
    }

    Ok(Segmentation {
        content_type,
        subject: first_str_field(&value, &["subject", "discipline"]).unwrap_or_default(),
        confidence,
        items,
    })
}

fn parse_item(raw: &Value, index: usize, default_type: ItemType) -> Option<SegmentedItem> {
    let stem = first_str_field(raw, &["stem", "content", "text", "body", "question"])?;

    let item_type = first_str_field(raw, &["item_type", "type"])
        .and_then(|s| ItemType::parse(&s))
        .unwrap_or(default_type);
    let number = first_str_field(raw, &["number", "ordinal", "id"])
        .unwrap_or_else(|| (index + 1).to_string());

    let knowledge_points = ["knowledge_points", "knowledge", "points"]
        .iter()
        .find_map(|key| raw.get(*key))
        .map(KnowledgePointRef::list_from_value)
        .unwrap_or_default();

    Some(SegmentedItem {
        item_type,
        number,
        title: first_str_field(raw, &["title", "name"]).unwrap_or_default(),
        stem,
        answer: first_str_field(raw, &["answer", "reference_answer"]),
        knowledge_points,
        difficulty: first_str_field(raw, &["difficulty"]).and_then(|s| Difficulty::parse(&s)),
        guidance: first_str_field(raw, &["guidance_level", "guidance"])
            .and_then(|s| GuidanceLevel::parse(&s)),
        difficulty_rationale: first_str_field(
            raw,
            &["difficulty_reason", "difficulty_rationale", "reason"],
        )
        .unwrap_or_default(),
    })
}

fn build_segmentation_prompt(text: &str) -> String {
    format!(
        r#"Classify the following text and split it into items.

1. Decide whether the text is an exam paper ("exam") or study material ("study_material").
2. Name the academic subject it belongs to.
3. Split it into items. For an exam, every numbered question is one item of type "question".
   For study material, every self-contained topic is one item of type "knowledge_section".
4. For each item give: its number as printed, a short title, the full body text as "stem"
   (question text only, without any answer), the answer if the text provides one,
   the knowledge points it tests, a difficulty ("simple", "medium" or "hard"),
   a guidance level ("high", "medium" or "low") and one sentence explaining the rating.

Keep items in their original order and copy body text verbatim.

Return JSON:
{{
    "content_type": "exam",
    "subject": "subject name",
    "confidence": 0.9,
    "items": [
        {{
            "type": "question",
            "number": "1",
            "title": "short title",
            "stem": "full question text",
            "answer": "answer if present, otherwise omit",
            "knowledge_points": ["point one", "point two"],
            "difficulty": "medium",
            "guidance_level": "medium",
            "difficulty_reason": "why"
        }}
    ]
}}

TEXT:
{text}"#
    )
}
