//! SQLite implementation of the JobStore

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::domain::jobs::{Job, JobStatus, JobStore, JobType};
use crate::error::{Error, Result};

/// Job snapshots in the `jobs` table, one row per job id
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn save(&self, job: &Job) -> Result<()> {
        let params = serde_json::to_string(&job.params)?;
        let result = job.result.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, job_type, status, progress, message, params, result, error,
                created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                progress = excluded.progress,
                message = excluded.message,
                result = excluded.result,
                error = excluded.error,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&job.id)
        .bind(job.job_type.as_str())
        .bind(job.status.as_str())
        .bind(i64::from(job.progress))
        .bind(&job.message)
        .bind(&params)
        .bind(&result)
        .bind(&job.error)
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(job_id = %job.id, status = %job.status, "Job snapshot saved");
        Ok(())
    }

    async fn load(&self, job_id: &str) -> Result<Option<Job>> {
        let row: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| r.into_job()).transpose()
    }

    async fn list(&self, limit: Option<u32>) -> Result<Vec<Job>> {
        let limit = limit.map(i64::from).unwrap_or(-1);
        let rows: Vec<JobRow> =
            sqlx::query_as("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ?")
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(|r| r.into_job()).collect()
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        // rfc3339 strings in UTC sort chronologically
        let ids: Vec<(String,)> = sqlx::query_as("DELETE FROM jobs WHERE created_at < ? RETURNING id")
            .bind(cutoff.to_rfc3339())
            .fetch_all(&self.pool)
            .await?;

        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

#[derive(Debug, FromRow)]
struct JobRow {
    id: String,
    job_type: String,
    status: String,
    progress: i64,
    message: String,
    params: String,
    result: Option<String>,
    error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let job_type = JobType::parse(&self.job_type)
            .ok_or_else(|| Error::Other(format!("Invalid job type: {}", self.job_type)))?;
        let status = JobStatus::parse(&self.status)
            .ok_or_else(|| Error::Other(format!("Invalid job status: {}", self.status)))?;

        let params = serde_json::from_str(&self.params)?;
        let result = self
            .result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;

        Ok(Job {
            id: self.id,
            job_type,
            status,
            progress: self.progress.clamp(0, 100) as u8,
            message: self.message,
            params,
            result,
            error: self.error,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::JobUpdate;
    use crate::storage::Database;
    use serde_json::json;

    async fn setup_store() -> SqliteJobStore {
        let db = Database::in_memory().await.expect("Failed to create database");
        SqliteJobStore::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_save_and_load_snapshot() {
        let store = setup_store().await;

        let mut job = Job::new(JobType::Ingest, json!({"text": "1. What is a stack?"}));
        store.save(&job).await.unwrap();

        job.apply(JobUpdate::running(40, "Item 2/5")).unwrap();
        store.save(&job).await.unwrap();

        let loaded = store.load(&job.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Running);
        assert_eq!(loaded.progress, 40);
        assert_eq!(loaded.message, "Item 2/5");
        assert_eq!(loaded.params, json!({"text": "1. What is a stack?"}));
        assert!(loaded.result.is_none());
    }

    #[tokio::test]
    async fn test_result_and_error_roundtrip() {
        let store = setup_store().await;

        let mut ok = Job::new(JobType::DocumentMindmap, json!({"document_id": "d1"}));
        ok.apply(JobUpdate::running(0, "Started")).unwrap();
        ok.apply(JobUpdate::completed(json!({"mindmap": "mindmap\n  root((x))"})))
            .unwrap();
        store.save(&ok).await.unwrap();

        let mut bad = Job::new(JobType::QuestionMindmap, json!({}));
        bad.apply(JobUpdate::running(0, "Started")).unwrap();
        bad.apply(JobUpdate::failed("Question 'q' not found.")).unwrap();
        store.save(&bad).await.unwrap();

        let ok = store.load(&ok.id).await.unwrap().unwrap();
        assert_eq!(ok.result.unwrap()["mindmap"], "mindmap\n  root((x))");
        let bad = store.load(&bad.id).await.unwrap().unwrap();
        assert_eq!(bad.status, JobStatus::Failed);
        assert_eq!(bad.error.as_deref(), Some("Question 'q' not found."));
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let store = setup_store().await;

        let mut old = Job::new(JobType::Ingest, json!({}));
        old.created_at = Utc::now() - chrono::Duration::days(8);
        let recent = Job::new(JobType::Ingest, json!({}));
        store.save(&old).await.unwrap();
        store.save(&recent).await.unwrap();

        let removed = store
            .delete_older_than(Utc::now() - chrono::Duration::days(7))
            .await
            .unwrap();
        assert_eq!(removed, vec![old.id.clone()]);
        assert!(store.load(&old.id).await.unwrap().is_none());
        assert!(store.load(&recent.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let store = setup_store().await;

        let mut older = Job::new(JobType::Ingest, json!({"n": 1}));
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let newer = Job::new(JobType::Ingest, json!({"n": 2}));
        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();

        let jobs = store.list(None).await.unwrap();
        assert_eq!(jobs[0].id, newer.id);
        assert_eq!(store.list(Some(1)).await.unwrap().len(), 1);
    }
}
