//! Job entity and its lifecycle
//!
//! ```text
//! pending ──► running ──► completed
//!                    └──► failed
//! ```
//!
//! Status only moves forward. Self-transitions on `pending` and `running`
//! carry progress updates. A terminal job never changes again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Position in the lifecycle; terminal states share the last rank
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Pending | Self::Running)
                | (Self::Running, Self::Running | Self::Completed | Self::Failed)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of background work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Full pipeline over one document
    Ingest,
    QuestionMindmap,
    DocumentMindmap,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::QuestionMindmap => "question_mindmap",
            Self::DocumentMindmap => "document_mindmap",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ingest" => Some(Self::Ingest),
            "question_mindmap" => Some(Self::QuestionMindmap),
            "document_mindmap" => Some(Self::DocumentMindmap),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A durable, pollable record of one background execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Opaque token handed to the submitter
    pub id: String,
    pub job_type: JobType,
    pub status: JobStatus,
    /// Percentage in `0..=100`
    pub progress: u8,
    pub message: String,
    /// Copy of the submitted parameters
    pub params: Value,
    /// Set only on `completed`
    pub result: Option<Value>,
    /// Set only on `failed`
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(job_type: JobType, params: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            job_type,
            status: JobStatus::Pending,
            progress: 0,
            message: "Queued".to_string(),
            params,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply an update, enforcing the lifecycle rules
    pub fn apply(&mut self, update: JobUpdate) -> Result<()> {
        if !self.status.can_transition_to(update.status) {
            return Err(Error::InvalidJobTransition {
                job_id: self.id.clone(),
                from: self.status.to_string(),
                to: update.status.to_string(),
            });
        }
        if update.result.is_some() && update.status != JobStatus::Completed {
            return Err(Error::InvalidInput(
                "a job result may only accompany the completed status".to_string(),
            ));
        }
        if update.error.is_some() && update.status != JobStatus::Failed {
            return Err(Error::InvalidInput(
                "a job error may only accompany the failed status".to_string(),
            ));
        }

        self.status = update.status;
        if let Some(progress) = update.progress {
            self.progress = progress.min(100);
        }
        if self.status == JobStatus::Completed {
            self.progress = 100;
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if update.result.is_some() {
            self.result = update.result;
        }
        if update.error.is_some() {
            self.error = update.error;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// A requested change to a job's snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            progress: None,
            message: None,
            result: None,
            error: None,
        }
    }

    pub fn running(progress: u8, message: impl Into<String>) -> Self {
        Self::new(JobStatus::Running)
            .with_progress(progress)
            .with_message(message)
    }

    pub fn completed(result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::new(JobStatus::Completed)
        }
        .with_message("Completed")
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(JobStatus::Failed)
        }
        .with_message("Failed")
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
