//! Segmentation output types

use serde::{Deserialize, Serialize};

use crate::domain::content::{ContentType, Difficulty, GuidanceLevel};
use crate::domain::knowledge::KnowledgePointRef;

/// Kind of a segmented item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    Question,
    KnowledgeSection,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::KnowledgeSection => "knowledge_section",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "question" | "exercise" | "problem" => Some(Self::Question),
            "knowledge_section" | "knowledge" | "section" => Some(Self::KnowledgeSection),
            _ => None,
        }
    }
}

/// One unit of input text prior to enrichment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentedItem {
    pub item_type: ItemType,
    /// Number as printed in the source
    pub number: String,
    pub title: String,
    /// Full body text
    pub stem: String,
    /// Answer found alongside the item in the source, if any
    pub answer: Option<String>,
    /// Knowledge point hints produced during segmentation
    pub knowledge_points: Vec<KnowledgePointRef>,
    /// `None` when segmentation did not rate the item
    pub difficulty: Option<Difficulty>,
    pub guidance: Option<GuidanceLevel>,
    pub difficulty_rationale: String,
}

impl SegmentedItem {
    pub fn question(number: impl Into<String>, stem: impl Into<String>) -> Self {
        Self::new(ItemType::Question, number, stem)
    }

    pub fn knowledge_section(number: impl Into<String>, stem: impl Into<String>) -> Self {
        Self::new(ItemType::KnowledgeSection, number, stem)
    }

    fn new(item_type: ItemType, number: impl Into<String>, stem: impl Into<String>) -> Self {
        Self {
            item_type,
            number: number.into(),
            title: String::new(),
            stem: stem.into(),
            answer: None,
            knowledge_points: Vec::new(),
            difficulty: None,
            guidance: None,
            difficulty_rationale: String::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer = Some(answer.into());
        self
    }

    pub fn with_knowledge_points(mut self, points: Vec<KnowledgePointRef>) -> Self {
        self.knowledge_points = points;
        self
    }

    pub fn with_rating(mut self, difficulty: Difficulty, guidance: GuidanceLevel) -> Self {
        self.difficulty = Some(difficulty);
        self.guidance = Some(guidance);
        self
    }

    /// Title for display, falling back to the item number
    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            format!("Item {}", self.number)
        } else {
            self.title.trim().to_string()
        }
    }

    /// Whether segmentation supplied usable knowledge point hints
    pub fn has_knowledge_hints(&self) -> bool {
        self.knowledge_points.iter().any(|p| p.display_name().is_some())
    }
}

/// Result of classifying and segmenting one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segmentation {
    pub content_type: ContentType,
    pub subject: String,
    /// Classifier confidence in `[0, 1]`
    pub confidence: f32,
    pub items: Vec<SegmentedItem>,
}
