//! Background execution of mindmap requests

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::domain::jobs::{JobContext, JobHandler};
use crate::error::{Error, Result};
use crate::llm::first_str_field;

use super::service::MindmapService;
use super::synthesizer::is_fallback;

fn required_id(params: &Value, key: &str) -> Result<String> {
    first_str_field(params, &[key, "id"])
        .ok_or_else(|| Error::InvalidInput(format!("missing '{}' parameter", key)))
}

/// `question_mindmap` jobs. Params: `{"question_id": "...", "regenerate": bool}`
pub struct QuestionMindmapJobHandler {
    service: MindmapService,
}

impl QuestionMindmapJobHandler {
    pub fn new(service: MindmapService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for QuestionMindmapJobHandler {
    async fn run(&self, params: Value, ctx: JobContext) -> Result<Value> {
        let question_id = required_id(&params, "question_id")?;
        let regenerate = params
            .get("regenerate")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        ctx.progress(10, "Synthesizing question mindmap").await?;
        let code = self.service.question_mindmap(&question_id, regenerate).await?;

        Ok(json!({
            "question_id": question_id,
            "mindmap": code,
            "fallback": is_fallback(&code),
        }))
    }
}

/// `document_mindmap` jobs. Params: `{"document_id": "..."}`
pub struct DocumentMindmapJobHandler {
    service: MindmapService,
}

impl DocumentMindmapJobHandler {
    pub fn new(service: MindmapService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for DocumentMindmapJobHandler {
    async fn run(&self, params: Value, ctx: JobContext) -> Result<Value> {
        let document_id = required_id(&params, "document_id")?;

        ctx.progress(10, "Synthesizing document mindmap").await?;
        let code = self.service.document_mindmap(&document_id).await?;

        Ok(json!({
            "document_id": document_id,
            "mindmap": code,
            "fallback": is_fallback(&code),
        }))
    }
}
