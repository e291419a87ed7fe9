//! Units of background work

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

use super::entity::JobUpdate;
use super::manager::JobManager;

/// Executes one job type. The returned value becomes the job's result.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn run(&self, params: Value, ctx: JobContext) -> Result<Value>;
}

/// Handle given to a running handler for reporting progress
#[derive(Clone)]
pub struct JobContext {
    job_id: String,
    manager: JobManager,
}

impl JobContext {
    pub(crate) fn new(job_id: String, manager: JobManager) -> Self {
        Self { job_id, manager }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Persist a progress snapshot while the job is running
    pub async fn progress(&self, percent: u8, message: impl Into<String>) -> Result<()> {
        self.manager
            .update(&self.job_id, JobUpdate::running(percent, message))
            .await
            .map(|_| ())
    }
}
