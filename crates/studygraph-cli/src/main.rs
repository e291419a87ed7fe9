//! Studygraph CLI - ingest study material and explore its knowledge graph

use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;
use studygraph_core::app::Services;
use studygraph_core::config::Config;
use studygraph_core::domain::ingest::{IngestReport, IngestRequest};
use studygraph_core::domain::jobs::{Job, JobType};
use studygraph_core::infrastructure::extractor::{
    ContentExtractor, ContentSource, PlainTextExtractor,
};
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "studygraph")]
#[command(author, version, about = "Turn exam papers and notes into a knowledge graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify, segment and enrich a text file or inline text
    Ingest {
        /// Path to a .txt/.md file
        source: Option<String>,
        /// Ingest this text instead of a file
        #[arg(long, conflicts_with = "source")]
        text: Option<String>,
        /// Document title (defaults to the file name or first line)
        #[arg(long)]
        title: Option<String>,
        /// Subject label, overriding the classifier
        #[arg(short, long)]
        subject: Option<String>,
        /// Skip the document mindmap
        #[arg(long)]
        no_mindmap: bool,
        /// Run as a background job and poll it to completion
        #[arg(long)]
        job: bool,
    },

    /// Background jobs
    Jobs {
        #[command(subcommand)]
        action: JobAction,
    },

    /// Mindmaps for questions and documents
    Mindmap {
        #[command(subcommand)]
        action: MindmapAction,
    },

    /// Knowledge points
    Points {
        #[command(subcommand)]
        action: PointAction,
    },

    /// Ingested documents
    Documents {
        #[command(subcommand)]
        action: DocumentAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum JobAction {
    /// Submit a job and wait for it to finish
    Submit {
        /// ingest, question_mindmap or document_mindmap
        #[arg(value_parser = parse_job_type)]
        job_type: JobType,
        /// Job parameters as a JSON object
        #[arg(long, default_value = "{}")]
        params: String,
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 500)]
        interval_ms: u64,
    },
    /// Show a job's latest snapshot
    Status { id: String },
    /// List jobs, newest first
    List {
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Delete jobs older than the retention window
    Sweep,
}

#[derive(Subcommand)]
enum MindmapAction {
    /// Mindmap for one question (cached unless --regenerate)
    Question {
        id: String,
        #[arg(long)]
        regenerate: bool,
    },
    /// Mindmap for a whole document (always recomputed)
    Document { id: String },
}

#[derive(Subcommand)]
enum PointAction {
    /// List knowledge points
    List {
        #[arg(short, long)]
        subject: Option<String>,
    },
    /// Questions linked to a knowledge point
    Questions { id: String },
    /// Knowledge points linked to a question
    ForQuestion { id: String },
    /// Graph statistics
    Stats,
}

#[derive(Subcommand)]
enum DocumentAction {
    /// List documents, newest first
    List {
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Show a document and its questions
    Show { id: String },
    /// Delete a document and its questions
    Delete {
        id: String,
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// List all configuration values
    List,
    /// Show config file path
    Path,
}

fn parse_job_type(value: &str) -> Result<JobType, String> {
    JobType::parse(value).ok_or_else(|| {
        format!(
            "unknown job type '{}'; expected ingest, question_mindmap or document_mindmap",
            value
        )
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("studygraph=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Commands::Config { action } = &cli.command {
        return cmd_config(action, cli.format);
    }

    let config = Config::load()?;
    let services = Services::open(&config).await?;
    debug!(db = %services.database.path().display(), "Services ready");

    match cli.command {
        Commands::Ingest {
            source,
            text,
            title,
            subject,
            no_mindmap,
            job,
        } => {
            let input = IngestInput {
                source,
                text,
                title,
                subject,
                no_mindmap,
            };
            cmd_ingest(&services, input, job, cli.format, cli.quiet).await
        }
        Commands::Jobs { action } => cmd_jobs(&services, action, cli.format, cli.quiet).await,
        Commands::Mindmap { action } => cmd_mindmap(&services, action, cli.format).await,
        Commands::Points { action } => cmd_points(&services, action, cli.format).await,
        Commands::Documents { action } => {
            cmd_documents(&services, action, cli.format, cli.quiet).await
        }
        Commands::Doctor => cmd_doctor(&services, &config, cli.quiet).await,
        Commands::Config { .. } => Ok(()),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

struct IngestInput {
    source: Option<String>,
    text: Option<String>,
    title: Option<String>,
    subject: Option<String>,
    no_mindmap: bool,
}

async fn build_request(input: IngestInput) -> anyhow::Result<IngestRequest> {
    let source = match (input.text, input.source) {
        (Some(text), _) => ContentSource::Inline(text),
        (None, Some(path)) => ContentSource::detect(&path),
        (None, None) => {
            return Err(anyhow::anyhow!(
                "Nothing to ingest. Pass a file path or --text \"...\"."
            ));
        }
    };

    let extracted = PlainTextExtractor::new().extract(&source).await?;

    let mut request = IngestRequest::new(extracted.text)
        .with_source(extracted.source_kind, extracted.source_ref);
    if let Some(title) = input.title.or(extracted.title_hint) {
        request = request.with_title(title);
    }
    if let Some(subject) = input.subject {
        request = request.with_subject(subject);
    }
    if input.no_mindmap {
        request = request.with_document_mindmap(false);
    }
    Ok(request)
}

async fn cmd_ingest(
    services: &Services,
    input: IngestInput,
    as_job: bool,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    let request = build_request(input).await?;

    if as_job {
        let job_id = services
            .jobs
            .submit(JobType::Ingest, serde_json::to_value(&request)?)
            .await?;
        let job = poll_job(services, &job_id, Duration::from_millis(500), quiet).await?;
        return print_job(&job, format);
    }

    if !quiet && format == OutputFormat::Text {
        println!("Ingesting {} characters...", request.text.chars().count());
    }

    let report = services.ingestion.ingest(request).await?;
    info!(document_id = %report.document_id, "Ingest command finished");

    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Text => {
            print_report(&report);
            Ok(())
        }
    }
}

fn print_report(report: &IngestReport) {
    println!("Document: {}", report.document_id);
    println!("  Type: {}", report.content_type);
    println!("  Subject: {}", report.subject);
    println!(
        "  Items: {} of {} enriched{}",
        report.succeeded,
        report.submitted,
        if report.is_partial() {
            format!(" ({} skipped)", report.failed)
        } else {
            String::new()
        }
    );
    if !report.knowledge_points.is_empty() {
        println!("  Knowledge points: {}", report.knowledge_points.join(", "));
    }
    if let Some(mindmap) = &report.mindmap {
        println!();
        println!("{}", mindmap);
    }
}

async fn cmd_jobs(
    services: &Services,
    action: JobAction,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    match action {
        JobAction::Submit {
            job_type,
            params,
            interval_ms,
        } => {
            let params: serde_json::Value = serde_json::from_str(&params)
                .map_err(|e| anyhow::anyhow!("--params must be a JSON object: {}", e))?;
            let job_id = services.jobs.submit(job_type, params).await?;
            if !quiet && format == OutputFormat::Text {
                println!("Submitted job {}", job_id);
            }
            let job = poll_job(services, &job_id, Duration::from_millis(interval_ms), quiet).await?;
            print_job(&job, format)?;
        }
        JobAction::Status { id } => {
            let job = services.jobs.status(&id).await?;
            print_job(&job, format)?;
        }
        JobAction::List { limit } => {
            let jobs = services.jobs.list(limit).await?;
            if format == OutputFormat::Json {
                return print_json(&jobs);
            }
            if jobs.is_empty() {
                if !quiet {
                    println!("No jobs found.");
                }
            } else {
                for job in jobs {
                    println!(
                        "  {}  {:<16} {:<9} {:>3}%  {}",
                        job.id,
                        job.job_type.as_str(),
                        job.status.as_str(),
                        job.progress,
                        job.message
                    );
                }
            }
        }
        JobAction::Sweep => {
            let removed = services.jobs.sweep_expired().await?;
            if !quiet {
                println!("Removed {} expired job(s).", removed);
            }
        }
    }
    Ok(())
}

/// Poll until terminal. The retention sweeper runs alongside for as long
/// as the command waits.
async fn poll_job(
    services: &Services,
    job_id: &str,
    interval: Duration,
    quiet: bool,
) -> anyhow::Result<Job> {
    let sweeper = services.start_retention_sweeper();
    let outcome = watch_job(services, job_id, interval, quiet).await;
    sweeper.abort();
    outcome
}

/// Echo each new progress message until the job is terminal
async fn watch_job(
    services: &Services,
    job_id: &str,
    interval: Duration,
    quiet: bool,
) -> anyhow::Result<Job> {
    let mut last_message = String::new();
    loop {
        let job = services.jobs.status(job_id).await?;
        if !quiet && job.message != last_message {
            eprintln!("[{:>3}%] {}", job.progress, job.message);
            last_message = job.message.clone();
        }
        if job.status.is_terminal() {
            return Ok(job);
        }
        tokio::time::sleep(interval).await;
    }
}

fn print_job(job: &Job, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        return print_json(job);
    }

    println!("Job: {}", job.id);
    println!("  Type: {}", job.job_type);
    println!("  Status: {}", job.status);
    println!("  Progress: {}%", job.progress);
    println!("  Message: {}", job.message);
    println!("  Created: {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated: {}", job.updated_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(result) = &job.result {
        println!("  Result: {}", serde_json::to_string_pretty(result)?);
    }
    if let Some(error) = &job.error {
        println!("  Error: {}", error);
    }
    Ok(())
}

async fn cmd_mindmap(
    services: &Services,
    action: MindmapAction,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let (id, code) = match action {
        MindmapAction::Question { id, regenerate } => {
            let code = services.mindmaps.question_mindmap(&id, regenerate).await?;
            (id, code)
        }
        MindmapAction::Document { id } => {
            let code = services.mindmaps.document_mindmap(&id).await?;
            (id, code)
        }
    };

    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "id": id, "mindmap": code })),
        OutputFormat::Text => {
            println!("{}", code);
            Ok(())
        }
    }
}

async fn cmd_points(
    services: &Services,
    action: PointAction,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match action {
        PointAction::List { subject } => {
            let points = services.graph.list_points(subject.as_deref()).await?;
            if format == OutputFormat::Json {
                return print_json(&points);
            }
            if points.is_empty() {
                println!("No knowledge points found.");
            }
            for p in points {
                println!("  {}  [{}] {}", p.id, p.subject, p.name);
            }
        }
        PointAction::Questions { id } => {
            let questions = services.graph.questions_for_point(&id).await?;
            if format == OutputFormat::Json {
                return print_json(&questions);
            }
            for q in questions {
                println!("  {}  {} ({})", q.id, q.title, q.difficulty);
            }
        }
        PointAction::ForQuestion { id } => {
            let points = services.graph.points_for_question(&id).await?;
            if format == OutputFormat::Json {
                return print_json(&points);
            }
            for p in points {
                println!("  {}  {}", p.id, p.name);
            }
        }
        PointAction::Stats => {
            let stats = services.graph.stats().await?;
            if format == OutputFormat::Json {
                return print_json(&stats);
            }
            println!("Knowledge points: {}", stats.point_count);
            println!("Question links: {}", stats.link_count);
            println!("Subjects: {}", stats.subject_count);
        }
    }
    Ok(())
}

async fn cmd_documents(
    services: &Services,
    action: DocumentAction,
    format: OutputFormat,
    quiet: bool,
) -> anyhow::Result<()> {
    match action {
        DocumentAction::List { limit } => {
            let documents = services.content.list_documents(limit).await?;
            if format == OutputFormat::Json {
                return print_json(&documents);
            }
            if documents.is_empty() {
                if !quiet {
                    println!("No documents found.");
                    println!("\nIngest one with: studygraph ingest <file>");
                }
            } else {
                for d in documents {
                    println!(
                        "  {}  {} [{} / {}]",
                        d.id, d.title, d.content_type, d.subject
                    );
                }
            }
        }
        DocumentAction::Show { id } => {
            let document = services.content.get_document(&id).await?.ok_or_else(|| {
                studygraph_core::Error::DocumentNotFound(id.clone())
            })?;
            let questions = services.content.list_questions_for_document(&id).await?;

            if format == OutputFormat::Json {
                return print_json(&serde_json::json!({
                    "document": document,
                    "questions": questions,
                }));
            }

            println!("Document: {}", document.title);
            println!("  ID: {}", document.id);
            println!("  Type: {}", document.content_type);
            println!("  Subject: {}", document.subject);
            println!("  Source: {}", document.source_kind);
            if let Some(source_ref) = &document.source_ref {
                println!("  Location: {}", source_ref);
            }
            println!("  Created: {}", document.created_at.format("%Y-%m-%d %H:%M:%S"));
            println!("  Questions: {}", questions.len());
            for q in questions {
                println!(
                    "    {}. {} ({}, guidance {})",
                    q.ordinal, q.title, q.difficulty, q.guidance_level
                );
            }
        }
        DocumentAction::Delete { id, force } => {
            if !force {
                println!("Warning: This will permanently delete document '{}' and its questions.", id);
                println!("Use --force to confirm deletion.");
                return Ok(());
            }
            if !services.content.delete_document(&id).await? {
                return Err(studygraph_core::Error::DocumentNotFound(id).into());
            }
            if !quiet {
                println!("Document '{}' deleted.", id);
            }
        }
    }
    Ok(())
}

fn cmd_config(action: &ConfigAction, format: OutputFormat) -> anyhow::Result<()> {
    match action {
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            if format == OutputFormat::Json {
                let map: serde_json::Map<String, serde_json::Value> = items
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect();
                return print_json(&map);
            }
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(services: &Services, config: &Config, quiet: bool) -> anyhow::Result<()> {
    if !quiet {
        println!("Studygraph Health Check");
        println!("=======================");
        println!();
    }

    let mut all_ok = true;

    match services.database.health_check().await {
        Ok(()) => println!("[OK] Database: {}", services.database.path().display()),
        Err(e) => {
            all_ok = false;
            println!("[FAIL] Database: {}", e);
        }
    }

    let status = services.database.migration_status().await?;
    if status.needs_migration {
        all_ok = false;
        println!(
            "[FAIL] Schema: version {} of {}",
            status.current_version, status.target_version
        );
    } else {
        println!("[OK] Schema: version {}", status.current_version);
    }

    match config.llm.redacted_api_key()? {
        Some(redacted) => println!("[OK] API Key: Configured ({})", redacted),
        None => {
            all_ok = false;
            println!("[FAIL] API Key: Not set. Export STUDYGRAPH_API_KEY or OPENROUTER_API_KEY.");
        }
    }

    let stats = services.graph.stats().await?;
    println!(
        "[OK] Knowledge graph: {} point(s) across {} subject(s)",
        stats.point_count, stats.subject_count
    );

    if !quiet {
        println!();
        if all_ok {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
