//! Async job manager
//!
//! Every submitted job gets its own supervisor task. The supervisor marks
//! the job running, runs the handler in a nested task, and records exactly
//! one terminal update from the outcome. A handler error or panic becomes
//! `failed` with a message; nothing propagates to the host.
//!
//! Every update is persisted before `update` returns, so a poller reading
//! the store always sees the latest snapshot. Lifecycle writes from the
//! supervisor are retried with backoff when the store rejects them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};

use super::entity::{Job, JobStatus, JobType, JobUpdate};
use super::handler::{JobContext, JobHandler};
use super::store::JobStore;

/// Default retention window for job records
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Attempts at persisting a supervisor lifecycle update
const RECORD_ATTEMPTS: u32 = 5;
const RECORD_BACKOFF: Duration = Duration::from_millis(50);

/// Builder for [`JobManager`]
pub struct JobManagerBuilder {
    store: Arc<dyn JobStore>,
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
    retention: chrono::Duration,
}

impl JobManagerBuilder {
    pub fn handler(mut self, job_type: JobType, handler: Arc<dyn JobHandler>) -> Self {
        self.handlers.insert(job_type, handler);
        self
    }

    pub fn retention_days(mut self, days: u32) -> Self {
        self.retention = chrono::Duration::days(i64::from(days));
        self
    }

    pub fn retention(mut self, retention: chrono::Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn build(self) -> JobManager {
        JobManager {
            inner: Arc::new(Inner {
                store: self.store,
                handlers: self.handlers,
                jobs: Mutex::new(HashMap::new()),
                retention: self.retention,
            }),
        }
    }
}

struct Inner {
    store: Arc<dyn JobStore>,
    handlers: HashMap<JobType, Arc<dyn JobHandler>>,
    /// Jobs submitted by this process
    jobs: Mutex<HashMap<String, Job>>,
    retention: chrono::Duration,
}

/// Submits, tracks and sweeps background jobs
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

impl JobManager {
    pub fn builder(store: Arc<dyn JobStore>) -> JobManagerBuilder {
        JobManagerBuilder {
            store,
            handlers: HashMap::new(),
            retention: chrono::Duration::days(i64::from(DEFAULT_RETENTION_DAYS)),
        }
    }

    /// Create a pending job, persist it, and start it in the background.
    ///
    /// Returns as soon as the job is recorded.
    pub async fn submit(&self, job_type: JobType, params: Value) -> Result<String> {
        let handler = self
            .inner
            .handlers
            .get(&job_type)
            .cloned()
            .ok_or_else(|| Error::UnknownJobType(job_type.to_string()))?;

        let job = Job::new(job_type, params.clone());
        let job_id = job.id.clone();
        {
            let mut jobs = self.inner.jobs.lock().await;
            self.inner.store.save(&job).await?;
            jobs.insert(job_id.clone(), job);
        }

        info!(job_id = %job_id, job_type = %job_type, "Job submitted");
        self.spawn_supervisor(job_id.clone(), handler, params);
        Ok(job_id)
    }

    /// Latest snapshot of a job: memory first, then the durable store
    pub async fn status(&self, job_id: &str) -> Result<Job> {
        if let Some(job) = self.inner.jobs.lock().await.get(job_id) {
            return Ok(job.clone());
        }
        self.inner
            .store
            .load(job_id)
            .await?
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))
    }

    /// Apply and persist an update. Backward transitions and updates to a
    /// terminal job are rejected. The in-memory snapshot only changes once
    /// the store has accepted the new one, so a failed save can be retried.
    pub async fn update(&self, job_id: &str, update: JobUpdate) -> Result<Job> {
        self.commit(job_id, std::slice::from_ref(&update)).await
    }

    /// Apply `updates` in order to one snapshot and persist it with a single save
    async fn commit(&self, job_id: &str, updates: &[JobUpdate]) -> Result<Job> {
        let mut jobs = self.inner.jobs.lock().await;

        let mut snapshot = match jobs.get(job_id) {
            Some(job) => job.clone(),
            None => self
                .inner
                .store
                .load(job_id)
                .await?
                .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?,
        };
        for update in updates {
            snapshot.apply(update.clone())?;
        }
        self.inner.store.save(&snapshot).await?;

        if let Some(job) = jobs.get_mut(job_id) {
            *job = snapshot.clone();
        }

        if snapshot.status.is_terminal() {
            info!(job_id = %job_id, status = %snapshot.status, "Job finished");
        } else {
            debug!(
                job_id = %job_id,
                status = %snapshot.status,
                progress = snapshot.progress,
                message = %snapshot.message,
                "Job updated"
            );
        }
        Ok(snapshot)
    }

    /// [`JobManager::commit`] with bounded exponential backoff, for the
    /// supervisor's lifecycle writes which must not be dropped
    async fn commit_with_retry(&self, job_id: &str, updates: &[JobUpdate]) -> Result<Job> {
        let mut attempt = 1;
        loop {
            match self.commit(job_id, updates).await {
                Err(
                    e @ (Error::InvalidJobTransition { .. }
                    | Error::InvalidInput(_)
                    | Error::JobNotFound(_)),
                ) => {
                    return Err(e);
                }
                Err(e) if attempt < RECORD_ATTEMPTS => {
                    let delay = RECORD_BACKOFF * 2u32.pow(attempt - 1);
                    warn!(
                        job_id = %job_id,
                        attempt = attempt,
                        wait_ms = delay.as_millis() as u64,
                        error = %e,
                        "Job update not persisted, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Jobs from the durable store, newest first
    pub async fn list(&self, limit: Option<u32>) -> Result<Vec<Job>> {
        self.inner.store.list(limit).await
    }

    /// Poll until the job reaches a terminal status
    pub async fn wait(&self, job_id: &str, poll_interval: Duration) -> Result<Job> {
        loop {
            let job = self.status(job_id).await?;
            if job.status.is_terminal() {
                return Ok(job);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Remove jobs older than the retention window, whatever their status
    pub async fn sweep_expired(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.inner.retention;
        self.sweep_older_than(cutoff).await
    }

    pub async fn sweep_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut jobs = self.inner.jobs.lock().await;
        let removed = self.inner.store.delete_older_than(cutoff).await?;
        jobs.retain(|id, job| job.created_at >= cutoff && !removed.contains(id));

        if !removed.is_empty() {
            info!(removed = removed.len(), cutoff = %cutoff.to_rfc3339(), "Expired jobs swept");
        }
        Ok(removed.len())
    }

    /// Run [`JobManager::sweep_expired`] on a fixed interval until aborted
    pub fn spawn_retention_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Job retention sweeper started");
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;
                if let Err(e) = manager.sweep_expired().await {
                    warn!(error = %e, "Job sweep failed");
                }
            }
        })
    }

    fn spawn_supervisor(&self, job_id: String, handler: Arc<dyn JobHandler>, params: Value) {
        let manager = self.clone();

        tokio::spawn(async move {
            let started = JobUpdate::running(0, "Started");
            if let Err(e) = manager
                .commit_with_retry(&job_id, std::slice::from_ref(&started))
                .await
            {
                error!(job_id = %job_id, error = %e, "Could not start job");
                // pending -> running -> failed, persisted as one write
                let failed = JobUpdate::failed(format!("could not start job: {}", e));
                if let Err(e) = manager.commit_with_retry(&job_id, &[started, failed]).await {
                    error!(job_id = %job_id, error = %e, "Could not record job failure");
                }
                return;
            }

            let ctx = JobContext::new(job_id.clone(), manager.clone());
            let task = tokio::spawn(async move { handler.run(params, ctx).await });

            let outcome = match task.await {
                Ok(Ok(result)) => JobUpdate::completed(result),
                Ok(Err(e)) => {
                    warn!(job_id = %job_id, error = %e, "Job failed");
                    JobUpdate::failed(e.to_string())
                }
                Err(join_error) => {
                    error!(job_id = %job_id, "Job task aborted");
                    JobUpdate::failed(describe_join_error(join_error))
                }
            };

            if let Err(e) = manager.commit_with_retry(&job_id, &[outcome]).await {
                error!(job_id = %job_id, error = %e, "Could not record job outcome");
            }
        });
    }
}

fn describe_join_error(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return "job task was cancelled".to_string();
    }
    let payload = join_error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("job panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("job panicked: {}", message)
    } else {
        "job panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Whether a sequence of observed statuses only ever moves forward
    fn is_monotonic(observed: &[JobStatus]) -> bool {
        observed.windows(2).all(|pair| pair[1].rank() >= pair[0].rank())
            && observed
                .iter()
                .position(|s| s.is_terminal())
                .is_none_or(|first| observed[first..].iter().all(|s| *s == observed[first]))
    }

    /// Map-backed store for manager tests
    #[derive(Default)]
    struct MemoryJobStore {
        jobs: StdMutex<HashMap<String, Job>>,
    }

    #[async_trait]
    impl JobStore for MemoryJobStore {
        async fn save(&self, job: &Job) -> Result<()> {
            self.jobs.lock().unwrap().insert(job.id.clone(), job.clone());
            Ok(())
        }

        async fn load(&self, job_id: &str) -> Result<Option<Job>> {
            Ok(self.jobs.lock().unwrap().get(job_id).cloned())
        }

        async fn list(&self, _limit: Option<u32>) -> Result<Vec<Job>> {
            Ok(self.jobs.lock().unwrap().values().cloned().collect())
        }

        async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
            let mut jobs = self.jobs.lock().unwrap();
            let expired: Vec<String> = jobs
                .values()
                .filter(|j| j.created_at < cutoff)
                .map(|j| j.id.clone())
                .collect();
            for id in &expired {
                jobs.remove(id);
            }
            Ok(expired)
        }
    }

    /// Delegates to [`MemoryJobStore`] but rejects a number of saves of
    /// the given status first
    struct FlakyJobStore {
        inner: MemoryJobStore,
        status: JobStatus,
        failures: AtomicUsize,
    }

    impl FlakyJobStore {
        fn failing(status: JobStatus, failures: usize) -> Self {
            Self {
                inner: MemoryJobStore::default(),
                status,
                failures: AtomicUsize::new(failures),
            }
        }
    }

    #[async_trait]
    impl JobStore for FlakyJobStore {
        async fn save(&self, job: &Job) -> Result<()> {
            if job.status == self.status
                && self
                    .failures
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(Error::Other("database is locked".to_string()));
            }
            self.inner.save(job).await
        }

        async fn load(&self, job_id: &str) -> Result<Option<Job>> {
            self.inner.load(job_id).await
        }

        async fn list(&self, limit: Option<u32>) -> Result<Vec<Job>> {
            self.inner.list(limit).await
        }

        async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
            self.inner.delete_older_than(cutoff).await
        }
    }

    struct EchoHandler;

    #[async_trait]
    impl JobHandler for EchoHandler {
        async fn run(&self, params: Value, ctx: JobContext) -> Result<Value> {
            ctx.progress(50, "Halfway").await?;
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(json!({"echo": params}))
        }
    }

    struct FailingHandler;

    #[async_trait]
    impl JobHandler for FailingHandler {
        async fn run(&self, _params: Value, _ctx: JobContext) -> Result<Value> {
            Err(Error::ClassificationFailed("model returned no parsable JSON".into()))
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl JobHandler for PanickingHandler {
        async fn run(&self, _params: Value, _ctx: JobContext) -> Result<Value> {
            panic!("handler exploded");
        }
    }

    fn manager_with(store: Arc<MemoryJobStore>) -> JobManager {
        JobManager::builder(store)
            .handler(JobType::Ingest, Arc::new(EchoHandler))
            .handler(JobType::QuestionMindmap, Arc::new(FailingHandler))
            .handler(JobType::DocumentMindmap, Arc::new(PanickingHandler))
            .build()
    }

    const POLL: Duration = Duration::from_millis(5);

    #[tokio::test]
    async fn test_submit_returns_pending_or_later_and_completes() {
        let store = Arc::new(MemoryJobStore::default());
        let manager = manager_with(store.clone());

        let id = manager.submit(JobType::Ingest, json!({"text": "hi"})).await.unwrap();
        let first = manager.status(&id).await.unwrap();
        assert_ne!(first.status, JobStatus::Failed);

        let done = manager.wait(&id, POLL).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.result, Some(json!({"echo": {"text": "hi"}})));
        assert_eq!(done.params, json!({"text": "hi"}));

        let persisted = store.load(&id).await.unwrap().unwrap();
        assert_eq!(persisted, done);
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failed() {
        let manager = manager_with(Arc::new(MemoryJobStore::default()));

        let id = manager.submit(JobType::QuestionMindmap, json!({})).await.unwrap();
        let done = manager.wait(&id, POLL).await.unwrap();

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("Classification failed"));
        assert!(done.result.is_none());
    }

    #[tokio::test]
    async fn test_panic_becomes_failed() {
        let manager = manager_with(Arc::new(MemoryJobStore::default()));

        let id = manager.submit(JobType::DocumentMindmap, json!({})).await.unwrap();
        let done = manager.wait(&id, POLL).await.unwrap();

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("job panicked: handler exploded"));
    }

    #[tokio::test]
    async fn test_unknown_job_type_rejected_before_creation() {
        let store = Arc::new(MemoryJobStore::default());
        let manager = JobManager::builder(store.clone()).build();

        let err = manager.submit(JobType::Ingest, json!({})).await.unwrap_err();
        assert!(matches!(err, Error::UnknownJobType(_)));
        assert!(store.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_reloads_from_store_after_restart() {
        let store = Arc::new(MemoryJobStore::default());
        let id = {
            let manager = manager_with(store.clone());
            let id = manager.submit(JobType::Ingest, json!({})).await.unwrap();
            manager.wait(&id, POLL).await.unwrap();
            id
        };

        let restarted = manager_with(store);
        let job = restarted.status(&id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);

        let err = restarted.status("missing").await.unwrap_err();
        assert!(matches!(err, Error::JobNotFound(_)));
    }

    #[tokio::test]
    async fn test_update_after_terminal_rejected() {
        let manager = manager_with(Arc::new(MemoryJobStore::default()));
        let id = manager.submit(JobType::Ingest, json!({})).await.unwrap();
        let done = manager.wait(&id, POLL).await.unwrap();

        let err = manager
            .update(&id, JobUpdate::running(10, "late"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidJobTransition { .. }));
        assert_eq!(manager.status(&id).await.unwrap(), done);
    }

    #[tokio::test]
    async fn test_observed_statuses_are_monotonic() {
        let manager = manager_with(Arc::new(MemoryJobStore::default()));
        let id = manager.submit(JobType::Ingest, json!({})).await.unwrap();

        let mut observed = Vec::new();
        loop {
            let job = manager.status(&id).await.unwrap();
            observed.push(job.status);
            if job.status.is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        assert!(is_monotonic(&observed));
        assert_eq!(observed.last(), Some(&JobStatus::Completed));
    }

    #[tokio::test]
    async fn test_sweep_removes_old_jobs_regardless_of_status() {
        let store = Arc::new(MemoryJobStore::default());
        let manager = JobManager::builder(store.clone())
            .handler(JobType::Ingest, Arc::new(EchoHandler))
            .retention(chrono::Duration::zero())
            .build();

        let id = manager.submit(JobType::Ingest, json!({})).await.unwrap();
        manager.wait(&id, POLL).await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        let removed = manager.sweep_expired().await.unwrap();
        assert_eq!(removed, 1);
        assert!(matches!(
            manager.status(&id).await.unwrap_err(),
            Error::JobNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_sweep_keeps_recent_jobs() {
        let store = Arc::new(MemoryJobStore::default());
        let manager = manager_with(store);
        let id = manager.submit(JobType::Ingest, json!({})).await.unwrap();
        manager.wait(&id, POLL).await.unwrap();

        assert_eq!(manager.sweep_expired().await.unwrap(), 0);
        assert!(manager.status(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_retention_sweeper_runs() {
        let store = Arc::new(MemoryJobStore::default());
        let manager = JobManager::builder(store.clone())
            .handler(JobType::Ingest, Arc::new(EchoHandler))
            .retention(chrono::Duration::zero())
            .build();

        let id = manager.submit(JobType::Ingest, json!({})).await.unwrap();
        manager.wait(&id, POLL).await.unwrap();

        let sweeper = manager.spawn_retention_sweeper(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        sweeper.abort();

        assert!(store.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_terminal_write_survives_failed_save() {
        let store = Arc::new(FlakyJobStore::failing(JobStatus::Completed, 1));
        let manager = JobManager::builder(store.clone())
            .handler(JobType::Ingest, Arc::new(EchoHandler))
            .build();

        let id = manager.submit(JobType::Ingest, json!({})).await.unwrap();
        let done = manager.wait(&id, POLL).await.unwrap();
        assert_eq!(done.status, JobStatus::Completed);

        let durable = store.load(&id).await.unwrap().unwrap();
        assert_eq!(durable.status, JobStatus::Completed);
        assert_eq!(durable, done);

        let restarted = JobManager::builder(store).build();
        assert_eq!(
            restarted.status(&id).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_failed_save_leaves_snapshot_unchanged() {
        let store = Arc::new(FlakyJobStore::failing(JobStatus::Running, 1));
        let manager = JobManager::builder(store.clone()).build();

        let job = Job::new(JobType::Ingest, json!({}));
        store.inner.save(&job).await.unwrap();

        assert!(manager.update(&job.id, JobUpdate::running(5, "a")).await.is_err());
        assert_eq!(manager.status(&job.id).await.unwrap().status, JobStatus::Pending);

        let job = manager.update(&job.id, JobUpdate::running(5, "a")).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_job_that_cannot_start_is_recorded_failed() {
        let store = Arc::new(FlakyJobStore::failing(JobStatus::Running, usize::MAX));
        let manager = JobManager::builder(store.clone())
            .handler(JobType::Ingest, Arc::new(EchoHandler))
            .build();

        let id = manager.submit(JobType::Ingest, json!({})).await.unwrap();
        let done = manager.wait(&id, POLL).await.unwrap();

        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.error.unwrap().contains("could not start job"));
        assert_eq!(
            store.load(&id).await.unwrap().unwrap().status,
            JobStatus::Failed
        );
    }

    #[test]
    fn test_is_monotonic() {
        use JobStatus::*;
        assert!(is_monotonic(&[Pending, Pending, Running, Running, Completed]));
        assert!(is_monotonic(&[Running, Failed, Failed]));
        assert!(!is_monotonic(&[Running, Pending]));
        assert!(!is_monotonic(&[Completed, Failed]));
    }
}
