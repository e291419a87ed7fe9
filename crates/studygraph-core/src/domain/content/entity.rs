//! Document and question entities
//!
//! A [`Document`] is one ingested body of text. It exclusively owns the
//! [`Question`] rows derived from it; deleting the document deletes them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of an ingested document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    /// Exam paper or question set
    Exam,
    /// Lecture notes, textbook excerpts and similar free text
    StudyMaterial,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exam => "exam",
            Self::StudyMaterial => "study_material",
        }
    }

    /// Parse from string, accepting the loose labels models tend to return
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "exam" | "exam_paper" | "questions" | "question_set" => Some(Self::Exam),
            "study_material" | "study" | "material" | "notes" => Some(Self::StudyMaterial),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a document's text came from. Used for labeling only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    File,
    Url,
    #[default]
    Text,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Url => "url",
            Self::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "file" => Some(Self::File),
            "url" => Some(Self::Url),
            "text" | "none" => Some(Self::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Difficulty rating of a question, ordered from easiest to hardest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Simple,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Medium => "medium",
            Self::Hard => "hard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "simple" | "easy" => Some(Self::Simple),
            "medium" | "moderate" | "normal" => Some(Self::Medium),
            "hard" | "difficult" => Some(Self::Hard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How much step-by-step guidance a learner needs for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceLevel {
    High,
    #[default]
    Medium,
    Low,
}

impl GuidanceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Some(Self::High),
            "medium" | "moderate" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for GuidanceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ingested document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Raw text as received from the extractor
    pub content: String,
    /// Set once at ingestion
    pub content_type: ContentType,
    pub subject: String,
    pub source_kind: SourceKind,
    /// File path or URL, when the text did not arrive inline
    pub source_ref: Option<String>,
    pub summary: Option<String>,
    pub quiz: Option<String>,
    /// Most recently synthesized mindmap for the whole document
    pub mindmap_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        content_type: ContentType,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            content_type,
            subject: subject.into(),
            source_kind: SourceKind::Text,
            source_ref: None,
            summary: None,
            quiz: None,
            mindmap_code: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, kind: SourceKind, source_ref: Option<String>) -> Self {
        self.source_kind = kind;
        self.source_ref = source_ref;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// A question (or knowledge section) derived from a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// Owning document
    pub document_id: String,
    /// Number as printed in the source, e.g. "1" or "3(b)"
    pub ordinal: String,
    pub title: String,
    pub question_text: String,
    pub answer_text: String,
    pub subject: String,
    pub difficulty: Difficulty,
    pub guidance_level: GuidanceLevel,
    pub difficulty_reason: String,
    pub mindmap_code: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn new(
        document_id: impl Into<String>,
        title: impl Into<String>,
        question_text: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            ordinal: String::new(),
            title: title.into(),
            question_text: question_text.into(),
            answer_text: String::new(),
            subject: String::new(),
            difficulty: Difficulty::default(),
            guidance_level: GuidanceLevel::default(),
            difficulty_reason: String::new(),
            mindmap_code: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_ordinal(mut self, ordinal: impl Into<String>) -> Self {
        self.ordinal = ordinal.into();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_answer(mut self, answer: impl Into<String>) -> Self {
        self.answer_text = answer.into();
        self
    }

    pub fn with_rating(
        mut self,
        difficulty: Difficulty,
        guidance_level: GuidanceLevel,
        reason: impl Into<String>,
    ) -> Self {
        self.difficulty = difficulty;
        self.guidance_level = guidance_level;
        self.difficulty_reason = reason.into();
        self
    }
}
