//! Async job manager
//!
//! Wraps pipeline work as durable, pollable background jobs.
//!
//! ## Lifecycle
//!
//! `pending → running → {completed | failed}`; see [`JobStatus`].
//! A result is only ever set on `completed` and an error only on `failed`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let manager = JobManager::builder(store)
//!     .handler(JobType::Ingest, Arc::new(IngestJobHandler::new(ingestion)))
//!     .retention_days(7)
//!     .build();
//!
//! let job_id = manager.submit(JobType::Ingest, json!({"text": text})).await?;
//! let job = manager.status(&job_id).await?;
//! ```
//!
//! There is no cancellation: a job runs to completion or failure once
//! submitted. A caller that loses interest simply stops polling.

mod entity;
mod handler;
mod manager;
mod store;

pub use entity::{Job, JobStatus, JobType, JobUpdate};
pub use handler::{JobContext, JobHandler};
pub use manager::{DEFAULT_RETENTION_DAYS, JobManager, JobManagerBuilder};
pub use store::JobStore;
