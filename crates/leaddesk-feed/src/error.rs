use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode feed payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid feed URL: {0}")]
    InvalidBaseUrl(String),

    #[error("live subscription closed")]
    Closed,

    #[error("live subscription timed out")]
    SubscribeTimeout,

    #[error("feed driver has stopped")]
    DriverStopped,

    #[error("{0}")]
    Source(String),
}
