//! Background execution of ingestion

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::domain::jobs::{JobContext, JobHandler};
use crate::error::{Error, Result};

use super::service::{IngestProgress, IngestRequest, IngestionService};

/// Runs [`IngestionService::ingest`] for `ingest` jobs. Params are a
/// serialized [`IngestRequest`]; the result is the [`IngestReport`](super::IngestReport).
pub struct IngestJobHandler {
    service: IngestionService,
}

impl IngestJobHandler {
    pub fn new(service: IngestionService) -> Self {
        Self { service }
    }
}

#[async_trait]
impl JobHandler for IngestJobHandler {
    async fn run(&self, params: Value, ctx: JobContext) -> Result<Value> {
        let request: IngestRequest = serde_json::from_value(params)
            .map_err(|e| Error::InvalidInput(format!("invalid ingest parameters: {}", e)))?;

        let report = self
            .service
            .ingest_with_progress(request, &JobProgress(&ctx))
            .await?;

        Ok(serde_json::to_value(report)?)
    }
}

/// Forwards pipeline progress into the job record
struct JobProgress<'a>(&'a JobContext);

#[async_trait]
impl IngestProgress for JobProgress<'_> {
    async fn report(&self, percent: u8, message: String) {
        if let Err(e) = self.0.progress(percent, message).await {
            warn!(job_id = %self.0.job_id(), error = %e, "Failed to record job progress");
        }
    }
}
