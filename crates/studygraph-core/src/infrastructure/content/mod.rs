//! Content infrastructure implementations

mod repository;

pub(crate) use repository::QuestionRow;
pub use repository::SqliteContentRepository;
