//! Knowledge point entity types
//!
//! A knowledge point is a named, subject-scoped concept shared across many
//! questions. The `(name, subject)` pair is the dedup key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A node of the knowledge graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgePoint {
    pub id: String,
    /// Exact name as first stored; dedup compares it byte for byte
    pub name: String,
    pub subject: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl KnowledgePoint {
    pub fn new(name: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            subject: subject.into(),
            description: String::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A knowledge point as it arrives from a model or a caller: either a bare
/// name or a record carrying a description as well.
///
/// Every consumer normalizes through [`KnowledgePointRef::display_name`], so
/// both shapes behave identically downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KnowledgePointRef {
    Name(String),
    Labeled {
        #[serde(alias = "title", alias = "text", alias = "point")]
        name: String,
        #[serde(default, alias = "desc", alias = "summary")]
        description: String,
    },
}

impl KnowledgePointRef {
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    pub fn labeled(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Labeled {
            name: name.into(),
            description: description.into(),
        }
    }

    /// Trimmed name, or `None` when nothing usable remains
    pub fn display_name(&self) -> Option<&str> {
        let raw = match self {
            Self::Name(name) => name,
            Self::Labeled { name, .. } => name,
        };
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Name(_) => "",
            Self::Labeled { description, .. } => description.trim(),
        }
    }

    /// Build from an arbitrary JSON value, tolerating the shapes models
    /// produce: strings, or objects with a `name`, `title` or `text` field.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Name(s.clone())),
            Value::Object(map) => {
                let non_blank = |key: &&str| {
                    map.get(*key)
                        .and_then(Value::as_str)
                        .filter(|s| !s.trim().is_empty())
                };
                let name = ["name", "title", "text", "point"].iter().find_map(non_blank)?;
                let description = ["description", "desc", "summary"]
                    .iter()
                    .find_map(non_blank)
                    .unwrap_or_default();
                Some(Self::labeled(name, description))
            }
            _ => None,
        }
    }

    /// Parse a heterogeneous JSON array, dropping entries without usable text
    pub fn list_from_value(value: &Value) -> Vec<Self> {
        value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(Self::from_value)
                    .filter(|r| r.display_name().is_some())
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<&str> for KnowledgePointRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for KnowledgePointRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&KnowledgePoint> for KnowledgePointRef {
    fn from(point: &KnowledgePoint) -> Self {
        Self::labeled(point.name.clone(), point.description.clone())
    }
}
