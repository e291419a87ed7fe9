//! Service wiring
//!
//! Builds every pipeline component over one database and one generative
//! service. Collaborators are passed in explicitly; nothing is global.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::domain::content::ContentRepository;
use crate::domain::derivation::DerivationPipeline;
use crate::domain::ingest::{IngestJobHandler, IngestionService};
use crate::domain::jobs::{JobManager, JobType};
use crate::domain::knowledge::KnowledgeGraphManager;
use crate::domain::mindmap::{
    DocumentMindmapJobHandler, MindmapService, MindmapSynthesizer, QuestionMindmapJobHandler,
};
use crate::domain::segmentation::ClassificationEngine;
use crate::error::{Error, Result};
use crate::infrastructure::content::SqliteContentRepository;
use crate::infrastructure::jobs::SqliteJobStore;
use crate::infrastructure::knowledge::SqliteKnowledgeGraphRepository;
use crate::llm::{GenerativeService, LlmClient, ResponseFormat};
use crate::storage::{Database, DatabaseConfig};

/// Fully wired pipeline
#[derive(Clone)]
pub struct Services {
    pub database: Database,
    pub content: Arc<dyn ContentRepository>,
    pub graph: KnowledgeGraphManager,
    pub mindmaps: MindmapService,
    pub ingestion: IngestionService,
    pub jobs: JobManager,
    sweep_interval: Duration,
}

impl Services {
    pub fn new(database: Database, service: Arc<dyn GenerativeService>, config: &Config) -> Self {
        let pool = database.pool().clone();

        let content: Arc<dyn ContentRepository> =
            Arc::new(SqliteContentRepository::new(pool.clone()));
        let graph = KnowledgeGraphManager::new(Arc::new(SqliteKnowledgeGraphRepository::new(
            pool.clone(),
        )));
        let mindmaps = MindmapService::new(
            content.clone(),
            graph.clone(),
            MindmapSynthesizer::new(service.clone()),
        );
        let ingestion = IngestionService::new(
            ClassificationEngine::new(service.clone()),
            DerivationPipeline::new(service).with_max_item_chars(config.pipeline.max_item_chars),
            graph.clone(),
            content.clone(),
            mindmaps.clone(),
        )
        .with_document_mindmap(config.pipeline.generate_document_mindmap);

        let jobs = JobManager::builder(Arc::new(SqliteJobStore::new(pool)))
            .handler(
                JobType::Ingest,
                Arc::new(IngestJobHandler::new(ingestion.clone())),
            )
            .handler(
                JobType::QuestionMindmap,
                Arc::new(QuestionMindmapJobHandler::new(mindmaps.clone())),
            )
            .handler(
                JobType::DocumentMindmap,
                Arc::new(DocumentMindmapJobHandler::new(mindmaps.clone())),
            )
            .retention_days(config.jobs.retention_days)
            .build();

        Self {
            database,
            content,
            graph,
            mindmaps,
            ingestion,
            jobs,
            sweep_interval: Duration::from_secs(config.jobs.sweep_interval_secs.max(1)),
        }
    }

    /// Open the configured database and LLM client, then drop job records
    /// past the retention window.
    ///
    /// A missing API key does not fail here; commands that only read
    /// stored data keep working and generation fails when first used.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        config.validate()?;

        let database = Database::new(DatabaseConfig::from_settings(&config.database)).await?;

        let service: Arc<dyn GenerativeService> = match LlmClient::from_config(config.llm.clone()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                debug!(error = %e, "LLM client unavailable");
                Arc::new(UnavailableService(e.to_string()))
            }
        };

        let services = Self::new(database, service, config);
        services.sweep_expired_jobs().await;
        Ok(services)
    }

    /// One retention pass; a failure is logged and otherwise ignored
    pub async fn sweep_expired_jobs(&self) -> usize {
        match self.jobs.sweep_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(error = %e, "Job retention sweep failed");
                0
            }
        }
    }

    /// Start the periodic job retention sweep, every `jobs.sweep_interval_secs`
    pub fn start_retention_sweeper(&self) -> JoinHandle<()> {
        self.jobs.spawn_retention_sweeper(self.sweep_interval)
    }
}

/// Stand-in used when no API key is configured
struct UnavailableService(String);

#[async_trait]
impl GenerativeService for UnavailableService {
    async fn generate(&self, _prompt: &str, _format: ResponseFormat) -> Result<String> {
        Err(Error::ConfigError(self.0.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::{Job, JobStatus, JobStore};
    use chrono::Utc;
    use serde_json::json;

    #[tokio::test]
    async fn test_wired_services_run_mindmap_job() {
        let db = Database::in_memory().await.unwrap();
        let services = Services::new(
            db,
            Arc::new(UnavailableService("no key".to_string())),
            &Config::default(),
        );

        let job_id = services
            .jobs
            .submit(JobType::DocumentMindmap, json!({"document_id": "missing"}))
            .await
            .unwrap();
        let job = services
            .jobs
            .wait(&job_id, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_open_sweeps_expired_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = Some(dir.path().join("studygraph.db"));

        let (old_id, recent_id) = {
            let services = Services::open(&config).await.unwrap();
            let store = SqliteJobStore::new(services.database.pool().clone());

            let mut old = Job::new(JobType::Ingest, json!({"text": "old"}));
            old.created_at = Utc::now() - chrono::Duration::days(30);
            old.updated_at = old.created_at;
            store.save(&old).await.unwrap();

            let recent = Job::new(JobType::Ingest, json!({"text": "recent"}));
            store.save(&recent).await.unwrap();

            services.database.close().await;
            (old.id, recent.id)
        };

        let services = Services::open(&config).await.unwrap();
        assert!(matches!(
            services.jobs.status(&old_id).await.unwrap_err(),
            Error::JobNotFound(_)
        ));
        assert_eq!(
            services.jobs.status(&recent_id).await.unwrap().status,
            JobStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_unavailable_service_reports_config_error() {
        let err = UnavailableService("No API key found".to_string())
            .generate("hi", ResponseFormat::Text)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
