#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The observation store could not be reached for this request.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// The fallback answerer failed. Never raised on the rule path.
    #[error("Fallback answerer failed: {0}")]
    Fallback(String),
}

pub type Result<T> = std::result::Result<T, TimelineError>;
