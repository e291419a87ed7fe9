//! Durable job snapshots, keyed by job id

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

use super::entity::Job;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace the snapshot for `job.id`
    async fn save(&self, job: &Job) -> Result<()>;

    async fn load(&self, job_id: &str) -> Result<Option<Job>>;

    /// Most recently created first
    async fn list(&self, limit: Option<u32>) -> Result<Vec<Job>>;

    /// Delete every job created before `cutoff`, returning the deleted ids
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>>;
}
