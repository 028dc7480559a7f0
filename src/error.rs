use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Review source error: {0}")]
    Fetch(String),

    #[error("Rate limited by review source, retry after {0} seconds")]
    RateLimited(u64),

    #[error("App not found in store: {0}")]
    AppNotFound(String),

    #[error("No reviews could be fetched for {app_id} after {attempts} attempts")]
    SourceExhausted { app_id: String, attempts: u32 },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Input not found: {0}")]
    MissingInput(String),

    #[error("Unknown bank: {0}")]
    UnknownBank(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimited(_) | Error::Network(_) | Error::Fetch(_)
        )
    }

    /// True when the database rejected a single row rather than failing as a whole.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            Error::Database(rusqlite::Error::SqliteFailure(err, _)) => {
                err.code == rusqlite::ErrorCode::ConstraintViolation
            }
            _ => false,
        }
    }
}
