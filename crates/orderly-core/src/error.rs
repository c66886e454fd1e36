use crate::safety::SecurityError;
use crate::storage::models::PlanStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Plan {0} not found")]
    PlanNotFound(String),

    #[error("Plan {plan_id} is {status} and must be approved before execution")]
    NotApproved { plan_id: String, status: PlanStatus },
}

impl Error {
    /// Short label stored alongside per-item failure messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Security(_) => "security",
            Error::Classification(_) => "classification",
            Error::Config(_) => "config",
            Error::Database(_) => "persistence",
            Error::Cache(_) => "cache",
            Error::InvalidInput(_) => "input",
            Error::PlanNotFound(_) | Error::NotApproved { .. } => "policy",
        }
    }

    /// Message recorded on a plan item, e.g. `security: path ... escapes root ...`.
    pub fn item_message(&self) -> String {
        match self {
            Error::Io(e) => format!("io: {}", e),
            Error::Security(e) => format!("security: {}", e),
            Error::Classification(msg) => format!("classification: {}", msg),
            other => format!("{}: {}", other.kind(), other),
        }
    }

    /// True for errors that must abort the surrounding scan or execution loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Database(_) | Error::Config(_) | Error::InvalidInput(_)
        )
    }
}
