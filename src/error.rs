//! Error taxonomy for the pipeline and its collaborators.
//!
//! Only [`PipelineError`] ever reaches the caller of a run. Every other
//! error has a degraded path and is absorbed inside the pipeline.

use thiserror::Error;

/// Failure of an LLM-backed service call (classifier or deduplicator).
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Transport failure, timeout or refused connection.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("service quota exhausted")]
    QuotaExhausted,

    /// The service answered but the payload could not be understood.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("service error {status}: {body}")]
    Api { status: u16, body: String },
}

impl ServiceError {
    /// Maps a reqwest transport error the way every client does.
    pub fn from_transport(err: reqwest::Error, endpoint: &str, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ServiceError::Unavailable(format!("request timed out after {}s", timeout_secs))
        } else if err.is_connect() {
            ServiceError::Unavailable(format!("cannot connect to {}", endpoint))
        } else if err.is_decode() {
            ServiceError::MalformedResponse(err.to_string())
        } else {
            ServiceError::Unavailable(err.to_string())
        }
    }

    /// Maps a non-success HTTP status.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            429 => ServiceError::RateLimited,
            402 => ServiceError::QuotaExhausted,
            _ => ServiceError::Api { status, body },
        }
    }
}

/// Failure of the live review source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("review source unavailable: {0}")]
    Unavailable(String),

    #[error("review source returned no reviews")]
    EmptyResult,

    #[error("no review scraper endpoint configured")]
    NotConfigured,
}

/// Failure of a report or custom topic store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid value: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        StoreError::Io {
            source,
            context: context.into(),
        }
    }

    pub fn json(source: serde_json::Error, context: impl Into<String>) -> Self {
        StoreError::Json {
            source,
            context: context.into(),
        }
    }
}

/// Errors that end a run.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Bad request; raised before any phase starts.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("an analysis run is already in progress")]
    AlreadyRunning,

    #[error("analysis cancelled")]
    Cancelled,

    /// A failure with no degraded path.
    #[error("{0}")]
    Fatal(String),
}
