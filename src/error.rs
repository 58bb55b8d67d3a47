use thiserror::Error as ThisError;

#[derive(ThisError, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("HTTP {status}: {snippet}")]
    Transport { status: u16, snippet: String },

    #[error("Provider rejected request: {0}")]
    ProviderRejected(String),

    #[error("Premium endpoint required: {0}")]
    PlanRestricted(String),

    #[error("Rate limit hit repeatedly: {0}")]
    RateLimitExhausted(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("No records in requested window")]
    EmptyResult,

    #[error("Record validation failed: {0}")]
    StoreValidation(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Io(format!("CSV error: {}", err))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<isahc::Error> for AppError {
    fn from(err: isahc::Error) -> Self {
        AppError::Transport {
            status: 0,
            snippet: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

// Alias for convenience
pub type Error = AppError;
