use bansos_types::models::UnknownLabel;
use bansos_types::rules::RuleError;

/// Failures raised by either storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned: {0}")]
    Lock(String),

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("hosted backend request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("hosted backend returned {status}: {body}")]
    Remote { status: u16, body: String },

    /// A unique key was taken between the existence check and the insert.
    #[error("duplicate value for {0}")]
    Duplicate(&'static str),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Rule(#[from] RuleError),
}

impl From<UnknownLabel> for StoreError {
    fn from(e: UnknownLabel) -> Self {
        Self::Corrupt(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
