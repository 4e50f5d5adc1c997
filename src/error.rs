//! Error types for the market research service

use thiserror::Error;

/// Result type alias for research operations
pub type Result<T> = std::result::Result<T, ResearchError>;

#[derive(Error, Debug)]
pub enum ResearchError {

    // =============================
    // Model API Errors
    // =============================

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // Documents & Persistence
    // =============================

    #[error("PDF error: {0}")]
    PdfError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ResearchError {
    /// True for the one error kind the agents retry.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ResearchError::RateLimited(_))
    }
}

impl From<sqlx::Error> for ResearchError {
    fn from(e: sqlx::Error) -> Self {
        ResearchError::DatabaseError(e.to_string())
    }
}

impl From<lopdf::Error> for ResearchError {
    fn from(e: lopdf::Error) -> Self {
        ResearchError::PdfError(e.to_string())
    }
}
