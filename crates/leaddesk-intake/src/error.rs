use std::time::Duration;

use leaddesk_core::ConfigError;
use leaddesk_db::DbError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the intake pipeline to its caller.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The payload was rejected before any side effect.
    #[error("{0}")]
    Validation(String),

    #[error("lead event {0} not found")]
    EventNotFound(Uuid),

    /// A contact or audit write failed.
    #[error("persistence failed: {0}")]
    Persistence(#[from] DbError),

    #[error(transparent)]
    Keywords(#[from] ConfigError),

    #[error("keyword pattern failed to compile: {0}")]
    KeywordPattern(#[from] regex::Error),

    #[error("scorer setup failed: {0}")]
    Scorer(#[from] ScoringError),
}

/// Failures of the external AI scorer. Always recovered by the fallback path.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("scoring service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("scoring service did not answer within {0:?}")]
    Timeout(Duration),

    /// The response did not have the expected shape or values.
    #[error("malformed scoring response: {0}")]
    Malformed(String),

    #[error("invalid scoring base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("no external scorer configured")]
    NotConfigured,
}
