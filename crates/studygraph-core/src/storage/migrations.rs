//! Versioned SQLite schema, applied when a [`super::Database`] opens

use sqlx::SqlitePool;

/// Current schema version
pub const CURRENT_VERSION: i32 = 2;

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS _migrations (
        version INTEGER PRIMARY KEY NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// Documents, questions and the knowledge-point graph
const MIGRATION_V1: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        content_type TEXT NOT NULL CHECK (content_type IN ('exam', 'study_material')),
        subject TEXT NOT NULL DEFAULT '',
        source_kind TEXT NOT NULL DEFAULT 'text' CHECK (source_kind IN ('file', 'url', 'text')),
        source_ref TEXT,
        summary TEXT,
        quiz TEXT,
        mindmap_code TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_documents_subject ON documents(subject);
    CREATE INDEX IF NOT EXISTS idx_documents_created_at ON documents(created_at);

    CREATE TABLE IF NOT EXISTS questions (
        id TEXT PRIMARY KEY NOT NULL,
        document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
        ordinal TEXT NOT NULL DEFAULT '',
        title TEXT NOT NULL,
        question_text TEXT NOT NULL,
        answer_text TEXT NOT NULL DEFAULT '',
        subject TEXT NOT NULL DEFAULT '',
        difficulty TEXT NOT NULL DEFAULT 'medium' CHECK (difficulty IN ('simple', 'medium', 'hard')),
        guidance_level TEXT NOT NULL DEFAULT 'medium' CHECK (guidance_level IN ('high', 'medium', 'low')),
        difficulty_reason TEXT NOT NULL DEFAULT '',
        mindmap_code TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_questions_document_id ON questions(document_id);

    CREATE TABLE IF NOT EXISTS knowledge_points (
        id TEXT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        subject TEXT NOT NULL DEFAULT '',
        description TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL,
        UNIQUE (name, subject)
    );

    CREATE INDEX IF NOT EXISTS idx_knowledge_points_subject ON knowledge_points(subject);

    CREATE TABLE IF NOT EXISTS question_knowledge_points (
        question_id TEXT NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
        knowledge_point_id TEXT NOT NULL REFERENCES knowledge_points(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        PRIMARY KEY (question_id, knowledge_point_id)
    );

    CREATE INDEX IF NOT EXISTS idx_qkp_knowledge_point_id ON question_knowledge_points(knowledge_point_id);
"#;

/// Durable job snapshots for pollable background work
const MIGRATION_V2: &str = r#"
    CREATE TABLE IF NOT EXISTS jobs (
        id TEXT PRIMARY KEY NOT NULL,
        job_type TEXT NOT NULL,
        status TEXT NOT NULL CHECK (status IN ('pending', 'running', 'completed', 'failed')),
        progress INTEGER NOT NULL DEFAULT 0,
        message TEXT NOT NULL DEFAULT '',
        params TEXT NOT NULL DEFAULT '{}',
        result TEXT,
        error TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at);
    CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);
"#;

struct Migration {
    version: i32,
    label: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        label: "documents, questions and knowledge graph",
        sql: MIGRATION_V1,
    },
    Migration {
        version: 2,
        label: "job snapshots",
        sql: MIGRATION_V2,
    },
];

async fn applied_version(pool: &SqlitePool) -> anyhow::Result<i32> {
    sqlx::raw_sql(CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM _migrations")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply every migration newer than the recorded version. Each step runs
/// in its own transaction together with its `_migrations` row.
pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    let from = applied_version(pool).await?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > from).collect();

    if pending.is_empty() {
        tracing::debug!(version = from, "Schema is current");
        return Ok(());
    }

    for migration in pending {
        tracing::info!(
            version = migration.version,
            label = migration.label,
            "Applying schema migration"
        );
        let mut tx = pool.begin().await?;
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await?;
        sqlx::query("INSERT OR IGNORE INTO _migrations (version) VALUES (?)")
            .bind(migration.version)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
    }

    tracing::info!(from = from, to = CURRENT_VERSION, "Schema migrated");
    Ok(())
}

/// Recorded and latest schema versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationStatus {
    pub current_version: i32,
    pub target_version: i32,
    pub needs_migration: bool,
}

pub async fn migration_status(pool: &SqlitePool) -> anyhow::Result<MigrationStatus> {
    let current_version = applied_version(pool).await?;
    Ok(MigrationStatus {
        current_version,
        target_version: CURRENT_VERSION,
        needs_migration: current_version < CURRENT_VERSION,
    })
}
