// dropkiosk-common/src/error.rs
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Error reported by (or while reaching) the external claim ledger.
    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// Typed outcomes of the allocation path. The display strings are stable:
/// the UI and operational triage both key off them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("No more codes available for drop {0}!")]
    PoolExhausted(Uuid),

    #[error("This link expired, please make sure to claim your code right after scanning the QR.")]
    ChallengeExpired,

    #[error("This link was already used by somebody else, scan the QR code again please")]
    ChallengeNotFound,

    #[error("Invalid verification proof")]
    ProofInvalid,

    #[error("Expired verification proof")]
    ProofExpired,
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
