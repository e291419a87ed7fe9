//! SQLite persistence: the pooled [`Database`] handle and the versioned
//! schema it migrates on open. Repositories live under `infrastructure`.

pub mod database;
pub mod migrations;

pub use database::{Database, DatabaseConfig, default_database_path};
pub use migrations::{CURRENT_VERSION, MigrationStatus, migration_status, run_migrations};
