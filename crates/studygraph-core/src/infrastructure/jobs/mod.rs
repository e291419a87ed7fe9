//! Job persistence

mod store;

pub use store::SqliteJobStore;
