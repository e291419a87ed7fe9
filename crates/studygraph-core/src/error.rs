//! Error types for Studygraph

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Document '{0}' not found. Run `studygraph documents list` to see all documents.")]
    DocumentNotFound(String),

    #[error("Question '{0}' not found.")]
    QuestionNotFound(String),

    #[error("Knowledge point '{0}' not found.")]
    KnowledgePointNotFound(String),

    // Network errors (E100-E199)
    #[error("Could not reach the model endpoint: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}. Check that STUDYGRAPH_API_KEY is set.")]
    LLMError(String),

    #[error("Rate limited by the model provider (retry after {0}s)")]
    RateLimited(u64),

    #[error("No suitable model found: {0}")]
    NoSuitableModel(String),

    // Pipeline errors (E200-E299)
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    #[error("Derivation failed for item {item}: {reason}")]
    ItemDerivationFailed { item: String, reason: String },

    // Job errors (E300-E399)
    #[error("Job '{0}' not found. It may have expired after the retention window.")]
    JobNotFound(String),

    #[error("Invalid job transition for '{job_id}': {from} -> {to}")]
    InvalidJobTransition {
        job_id: String,
        from: String,
        to: String,
    },

    #[error("No handler registered for job type '{0}'")]
    UnknownJobType(String),

    // Database errors (E400-E499)
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable code shown by the CLI next to the message
    pub fn code(&self) -> &'static str {
        match self {
            Self::DocumentNotFound(_) => "E001",
            Self::QuestionNotFound(_) => "E002",
            Self::KnowledgePointNotFound(_) => "E003",
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::NoSuitableModel(_) => "E103",
            Self::ClassificationFailed(_) => "E200",
            Self::ItemDerivationFailed { .. } => "E201",
            Self::JobNotFound(_) => "E300",
            Self::InvalidJobTransition { .. } => "E301",
            Self::UnknownJobType(_) => "E302",
            Self::DatabaseError(_) => "E400",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Json(_) | Self::Io(_) => "E9999",
        }
    }

    /// Command or setting that usually resolves the error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::DocumentNotFound(_) => Some("studygraph documents list".to_string()),
            Self::NetworkError(_) => Some("Check llm.base_url and network access".to_string()),
            Self::LLMError(_) => Some("export STUDYGRAPH_API_KEY=...".to_string()),
            Self::JobNotFound(_) => Some("studygraph jobs list".to_string()),
            Self::ClassificationFailed(_) => {
                Some("Retry the ingestion; the model returned no usable structure".to_string())
            }
            _ => None,
        }
    }

    /// Whether this error aborts a whole pipeline run rather than a single item
    pub fn is_fatal_to_pipeline(&self) -> bool {
        matches!(
            self,
            Self::ClassificationFailed(_) | Self::DatabaseError(_) | Self::ConfigError(_)
        )
    }
}
