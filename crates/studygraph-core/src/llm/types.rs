//! Wire types for OpenAI-compatible `/chat/completions` endpoints

use serde::{Deserialize, Serialize};

use super::service::ResponseFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body, borrowing the conversation so retries and fallbacks
/// do not copy it
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub temperature: f32,
    pub max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<JsonObjectFormat>,
}

impl<'a> ChatRequest<'a> {
    pub fn new(
        model: &'a str,
        messages: &'a [Message],
        temperature: f32,
        max_tokens: usize,
        format: ResponseFormat,
    ) -> Self {
        Self {
            model,
            messages,
            temperature,
            max_tokens,
            response_format: (format == ResponseFormat::Json).then_some(JsonObjectFormat::default()),
        }
    }
}

/// `{"type": "json_object"}`
#[derive(Debug, Clone, Serialize)]
pub struct JsonObjectFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl Default for JsonObjectFormat {
    fn default() -> Self {
        Self { kind: "json_object" }
    }
}

/// Response body. Only the fields the pipeline reads are modelled.
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ChoiceBody>,
    #[serde(default)]
    usage: Option<UsageBody>,
}

#[derive(Debug, Deserialize)]
struct ChoiceBody {
    message: ReplyBody,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyBody {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsageBody {
    #[serde(default)]
    total_tokens: u32,
}

/// First choice of a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub model: String,
    pub content: String,
    pub total_tokens: u32,
    /// The model stopped at `max_tokens`; JSON replies may be cut off
    pub truncated: bool,
}

impl ChatResponse {
    /// `None` when the endpoint returned no choices
    pub fn into_completion(self) -> Option<Completion> {
        let choice = self.choices.into_iter().next()?;
        Some(Completion {
            model: self.model,
            content: choice.message.content.unwrap_or_default(),
            total_tokens: self.usage.map(|u| u.total_tokens).unwrap_or(0),
            truncated: choice.finish_reason.as_deref() == Some("length"),
        })
    }
}
