//! Studygraph Core Integration Tests
//!
//! Drive the wired pipeline over in-memory SQLite with a scripted
//! generative service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use studygraph_core::{
    Error, Result,
    app::Services,
    config::Config,
    domain::ingest::{IngestReport, IngestRequest},
    domain::jobs::{JobManager, JobStatus, JobType},
    domain::knowledge::{KnowledgeGraphManager, KnowledgePointRef},
    domain::mindmap::{DIAGRAM_PREFIX, MINDMAP_FALLBACK},
    domain::segmentation::{SegmentedItem, merge_continuations},
    infrastructure::jobs::SqliteJobStore,
    infrastructure::knowledge::SqliteKnowledgeGraphRepository,
    llm::{GenerativeService, ResponseFormat},
    storage::{Database, DatabaseConfig},
};

/// Replies by prompt content. Segmentation gets the configured JSON, any
/// prompt containing a poisoned marker fails, mindmap prompts get a
/// diagram, analysis prompts get `stack`.
struct ScriptedService {
    segmentation: Value,
    poison: Option<&'static str>,
}

impl ScriptedService {
    fn new(segmentation: Value) -> Self {
        Self {
            segmentation,
            poison: None,
        }
    }

    fn poisoned(mut self, marker: &'static str) -> Self {
        self.poison = Some(marker);
        self
    }
}

#[async_trait]
impl GenerativeService for ScriptedService {
    async fn generate(&self, prompt: &str, format: ResponseFormat) -> Result<String> {
        if prompt.starts_with("Classify the following text") {
            return Ok(format!("```json\n{}\n```", self.segmentation));
        }
        if let Some(marker) = self.poison
            && prompt.contains(marker)
        {
            return Err(Error::LLMError("model overloaded".to_string()));
        }
        if prompt.contains("Mermaid mindmap") {
            return Ok("mindmap\n  root((Data Structures))\n    stack".to_string());
        }
        match format {
            ResponseFormat::Text => Ok("A stack is a last-in, first-out collection.".to_string()),
            ResponseFormat::Json => Ok(json!({
                "knowledge_points": ["stack"],
                "difficulty": "simple",
                "guidance_level": "medium",
                "difficulty_reason": "definition recall"
            })
            .to_string()),
        }
    }
}

/// Statuses never move backward and stay put once terminal
fn is_monotonic(observed: &[JobStatus]) -> bool {
    observed.windows(2).all(|pair| pair[1].rank() >= pair[0].rank())
        && observed
            .iter()
            .skip_while(|s| !s.is_terminal())
            .all(|s| Some(s) == observed.iter().find(|s| s.is_terminal()))
}

async fn services_with(service: ScriptedService) -> Services {
    let db = Database::in_memory().await.expect("Failed to create database");
    Services::new(db, Arc::new(service), &Config::default())
}

fn stack_exam() -> Value {
    json!({
        "content_type": "exam",
        "subject": "Computer Science",
        "confidence": 0.92,
        "items": [
            {
                "type": "question",
                "number": "1",
                "title": "Stack definition",
                "stem": "What is a stack?",
                "knowledge_points": ["stack"]
            },
            {
                "type": "question",
                "number": "2",
                "title": "Stack example",
                "stem": "Continuing from the previous question, give an example."
            }
        ]
    })
}

#[tokio::test]
async fn test_end_to_end_stack_question() {
    let services = services_with(ScriptedService::new(stack_exam())).await;

    let report: IngestReport = services
        .ingestion
        .ingest(
            IngestRequest::new(
                "1. What is a stack? 2. Continuing from the previous question, give an example.",
            )
            .with_subject("Data Structures"),
        )
        .await
        .unwrap();

    assert_eq!(report.submitted, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.subject, "Data Structures");
    assert_eq!(report.knowledge_points, vec!["stack".to_string()]);

    let questions = services
        .content
        .list_questions_for_document(&report.document_id)
        .await
        .unwrap();
    assert_eq!(questions.len(), 1);
    let question = &questions[0];
    assert_eq!(question.ordinal, "1");
    assert!(question.question_text.contains("What is a stack?"));
    assert!(question.question_text.contains("give an example"));
    assert!(!question.answer_text.is_empty());

    let points = services.graph.points_for_question(&question.id).await.unwrap();
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].name, "stack");

    let mindmap = services
        .mindmaps
        .question_mindmap(&question.id, false)
        .await
        .unwrap();
    assert!(mindmap.starts_with(DIAGRAM_PREFIX) || mindmap == MINDMAP_FALLBACK);
}

#[tokio::test]
async fn test_partial_failure_is_contained() {
    let segmentation = json!({
        "content_type": "exam",
        "subject": "Data Structures",
        "items": [
            {"number": "1", "stem": "Define a stack."},
            {"number": "2", "stem": "Define a queue."},
            {"number": "3", "stem": "POISON: define a deque."},
            {"number": "4", "stem": "Define a heap."}
        ]
    });
    let services =
        services_with(ScriptedService::new(segmentation).poisoned("POISON")).await;

    let report = services
        .ingestion
        .ingest(IngestRequest::new("four short questions"))
        .await
        .unwrap();

    assert_eq!(report.submitted, 4);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 1);
    assert!(report.is_partial());

    let ordinals: Vec<String> = services
        .content
        .list_questions_for_document(&report.document_id)
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.ordinal)
        .collect();
    assert_eq!(ordinals, vec!["1", "2", "4"]);
}

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let services = services_with(ScriptedService::new(stack_exam())).await;

    let first = services
        .graph
        .get_or_create("binary tree", "Data Structures", "")
        .await
        .unwrap();
    let second = services
        .graph
        .get_or_create("binary tree", "Data Structures", "A tree with fan-out two")
        .await
        .unwrap();
    assert_eq!(first, second);

    let points = services.graph.list_points(Some("Data Structures")).await.unwrap();
    assert_eq!(points.iter().filter(|p| p.name == "binary tree").count(), 1);
}

#[tokio::test]
async fn test_shared_point_across_documents() {
    let services = services_with(ScriptedService::new(stack_exam())).await;

    let a = services
        .ingestion
        .ingest(IngestRequest::new("paper A").with_subject("Data Structures"))
        .await
        .unwrap();
    let b = services
        .ingestion
        .ingest(IngestRequest::new("paper B").with_subject("Data Structures"))
        .await
        .unwrap();

    let points = services.graph.list_points(Some("Data Structures")).await.unwrap();
    assert_eq!(points.len(), 1);

    let questions = services
        .graph
        .questions_for_point(&points[0].id)
        .await
        .unwrap();
    let mut owners: Vec<&str> = questions.iter().map(|q| q.document_id.as_str()).collect();
    owners.sort();
    let mut expected = vec![a.document_id.as_str(), b.document_id.as_str()];
    expected.sort();
    assert_eq!(owners, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_get_or_create_yields_one_point() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(DatabaseConfig::with_path(dir.path().join("graph.db")).max_connections(5))
        .await
        .unwrap();
    let graph = KnowledgeGraphManager::new(Arc::new(SqliteKnowledgeGraphRepository::new(
        db.pool().clone(),
    )));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let graph = graph.clone();
            tokio::spawn(async move { graph.get_or_create("stack", "Data Structures", "").await })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let rows: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM knowledge_points WHERE name = 'stack' AND subject = 'Data Structures'",
    )
    .fetch_one(db.pool())
    .await
    .unwrap();
    assert_eq!(rows.0, 1);
    db.close().await;
}

#[tokio::test]
async fn test_link_three_times_keeps_one_row() {
    let services = services_with(ScriptedService::new(stack_exam())).await;
    let report = services
        .ingestion
        .ingest(IngestRequest::new("stack paper"))
        .await
        .unwrap();
    let question_id = &report.question_ids[0];

    let point_id = services
        .graph
        .get_or_create("LIFO", "Computer Science", "")
        .await
        .unwrap();
    for _ in 0..3 {
        services.graph.link(question_id, &point_id).await.unwrap();
    }

    let rows: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM question_knowledge_points WHERE question_id = ? AND knowledge_point_id = ?",
    )
    .bind(question_id)
    .bind(&point_id)
    .fetch_one(services.database.pool())
    .await
    .unwrap();
    assert_eq!(rows.0, 1);
}

#[test]
fn test_transitive_merge() {
    let items = vec![
        SegmentedItem::question("1", "A train leaves at 9:00 travelling at 80 km/h."),
        SegmentedItem::question("2", "Based on the previous question, how far has it gone by 11:00?"),
        SegmentedItem::question("3", "Continuing from the previous question, when does it reach 400 km?")
            .with_knowledge_points(vec![KnowledgePointRef::name("distance")]),
    ];

    let merged = merge_continuations(items);

    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].number, "1");
    assert_eq!(
        merged[0].stem,
        "A train leaves at 9:00 travelling at 80 km/h.\n\n\
         Based on the previous question, how far has it gone by 11:00?\n\n\
         Continuing from the previous question, when does it reach 400 km?"
    );
}

#[tokio::test]
async fn test_ingest_job_lifecycle_is_monotonic() {
    let services = services_with(ScriptedService::new(stack_exam())).await;

    let job_id = services
        .jobs
        .submit(
            JobType::Ingest,
            serde_json::to_value(IngestRequest::new("stack paper").with_subject("Data Structures"))
                .unwrap(),
        )
        .await
        .unwrap();

    let mut observed = Vec::new();
    let job = loop {
        let job = services.jobs.status(&job_id).await.unwrap();
        observed.push(job.status);
        if job.status.is_terminal() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    assert!(is_monotonic(&observed));
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    let result = job.result.clone().unwrap();
    assert_eq!(result["succeeded"], 1);
    assert!(job.error.is_none());

    // A fresh manager over the same store sees the same terminal snapshot
    let restarted = JobManager::builder(Arc::new(SqliteJobStore::new(
        services.database.pool().clone(),
    )))
    .build();
    let reloaded = restarted.status(&job_id).await.unwrap();
    assert_eq!(reloaded.status, JobStatus::Completed);
    assert_eq!(reloaded.result, job.result);
    assert_eq!(reloaded.progress, 100);
}

#[tokio::test]
async fn test_ingest_job_with_bad_params_fails() {
    let services = services_with(ScriptedService::new(stack_exam())).await;

    let job_id = services
        .jobs
        .submit(JobType::Ingest, json!({"title": "no text field"}))
        .await
        .unwrap();
    let job = services
        .jobs
        .wait(&job_id, Duration::from_millis(5))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.result.is_none());
    assert!(job.error.unwrap().contains("invalid ingest parameters"));
}

#[tokio::test]
async fn test_question_mindmap_job_caches_result() {
    let services = services_with(ScriptedService::new(stack_exam())).await;
    let report = services
        .ingestion
        .ingest(IngestRequest::new("stack paper"))
        .await
        .unwrap();

    let job_id = services
        .jobs
        .submit(
            JobType::QuestionMindmap,
            json!({"question_id": report.question_ids[0]}),
        )
        .await
        .unwrap();
    let job = services
        .jobs
        .wait(&job_id, Duration::from_millis(5))
        .await
        .unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    let result = job.result.unwrap();
    assert_eq!(result["fallback"], false);

    let question = services
        .content
        .get_question(&report.question_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(question.mindmap_code.as_deref(), result["mindmap"].as_str());
}
